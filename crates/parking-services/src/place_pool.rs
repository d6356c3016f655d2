//! Place Pool
//!
//! Owns the availability flag of every place. Allocation and release run
//! inside the caller's transaction so that claiming a place and binding it
//! to a ticket commit together.

use parking_core::config::PolicyConfig;
use parking_core::models::{MobilityFlag, Place, PlaceType};
use parking_core::traits::ParkingTx;
use parking_core::{AppError, AppResult};
use tracing::{debug, error, info, instrument, warn};

/// Which place types a client may be given, in order of preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Eligibility {
    pub pmr_may_use_standard: bool,
    pub standard_may_use_pmr: bool,
}

impl Eligibility {
    pub fn from_config(policy: &PolicyConfig) -> Self {
        Self {
            pmr_may_use_standard: policy.pmr_may_use_standard,
            standard_may_use_pmr: policy.standard_may_use_pmr,
        }
    }

    pub fn place_types(&self, mobility: MobilityFlag) -> Vec<PlaceType> {
        match mobility {
            MobilityFlag::Standard if self.standard_may_use_pmr => {
                vec![PlaceType::Standard, PlaceType::Pmr]
            }
            MobilityFlag::Standard => vec![PlaceType::Standard],
            MobilityFlag::Pmr if self.pmr_may_use_standard => {
                vec![PlaceType::Pmr, PlaceType::Standard]
            }
            MobilityFlag::Pmr => vec![PlaceType::Pmr],
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlacePool {
    eligibility: Eligibility,
}

impl PlacePool {
    pub fn new(eligibility: Eligibility) -> Self {
        Self { eligibility }
    }

    /// Claim the lowest-numbered free place of `place_type`
    ///
    /// Fails with `NoAvailability` when every place of that type is taken.
    #[instrument(skip(self, tx))]
    pub async fn allocate<T: ParkingTx>(&self, tx: &mut T, place_type: PlaceType) -> AppResult<Place> {
        match tx.claim_free_place(place_type).await? {
            Some(place) => {
                debug!(place_id = place.id, number = place.number, "Place allocated");
                Ok(place)
            }
            None => Err(AppError::NoAvailability(place_type.to_string())),
        }
    }

    /// Claim a place for a client, trying each eligible type in turn
    pub async fn allocate_for<T: ParkingTx>(
        &self,
        tx: &mut T,
        mobility: MobilityFlag,
    ) -> AppResult<Place> {
        let types = self.eligibility.place_types(mobility);

        for place_type in &types {
            match self.allocate(tx, *place_type).await {
                Ok(place) => return Ok(place),
                Err(AppError::NoAvailability(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        let wanted = types
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("/");
        warn!(mobility = %mobility, "No free place of type {}", wanted);
        Err(AppError::NoAvailability(wanted))
    }

    /// Mark a place free again
    ///
    /// Releasing a place that is already free means the caller lost track of
    /// the place's state; it fails with `PlaceNotOccupied`.
    #[instrument(skip(self, tx))]
    pub async fn release<T: ParkingTx>(&self, tx: &mut T, place_id: i64) -> AppResult<()> {
        if tx.release_place(place_id).await? {
            debug!(place_id, "Place released");
            Ok(())
        } else {
            error!(place_id, "Release of a place that is already free");
            Err(AppError::PlaceNotOccupied(place_id))
        }
    }

    /// Places ordered by number
    pub async fn list<T: ParkingTx>(
        &self,
        tx: &mut T,
        place_type: Option<PlaceType>,
    ) -> AppResult<Vec<Place>> {
        tx.list_places(place_type, false).await
    }

    /// Free places ordered by type, then number
    pub async fn available<T: ParkingTx>(
        &self,
        tx: &mut T,
        place_type: Option<PlaceType>,
    ) -> AppResult<Vec<Place>> {
        let mut places = tx.list_places(place_type, true).await?;
        places.sort_by_key(|p| (p.place_type.to_string(), p.number));
        Ok(places)
    }

    /// Create numbered places when the pool is empty
    ///
    /// Standard places are numbered from 1, PMR places follow. Returns the
    /// number of places created.
    pub async fn seed<T: ParkingTx>(&self, tx: &mut T, standard: u32, pmr: u32) -> AppResult<u32> {
        if tx.occupancy().await?.total > 0 {
            debug!("Place pool already populated, skipping seed");
            return Ok(0);
        }

        let mut number: i32 = 0;
        for place_type in std::iter::repeat(PlaceType::Standard)
            .take(standard as usize)
            .chain(std::iter::repeat(PlaceType::Pmr).take(pmr as usize))
        {
            number += 1;
            tx.insert_place(number, place_type).await?;
        }

        info!(standard, pmr, "Place pool seeded");
        Ok(standard + pmr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_eligibility_is_strict() {
        let eligibility = Eligibility::default();
        assert_eq!(
            eligibility.place_types(MobilityFlag::Standard),
            vec![PlaceType::Standard]
        );
        assert_eq!(eligibility.place_types(MobilityFlag::Pmr), vec![PlaceType::Pmr]);
    }

    #[test]
    fn test_fallbacks() {
        let eligibility = Eligibility {
            pmr_may_use_standard: true,
            standard_may_use_pmr: false,
        };
        assert_eq!(
            eligibility.place_types(MobilityFlag::Pmr),
            vec![PlaceType::Pmr, PlaceType::Standard]
        );
        assert_eq!(
            eligibility.place_types(MobilityFlag::Standard),
            vec![PlaceType::Standard]
        );

        let eligibility = Eligibility {
            pmr_may_use_standard: false,
            standard_may_use_pmr: true,
        };
        assert_eq!(
            eligibility.place_types(MobilityFlag::Standard),
            vec![PlaceType::Standard, PlaceType::Pmr]
        );
    }
}
