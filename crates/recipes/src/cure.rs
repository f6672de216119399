//! Temperature compensation for catalyst/hardener-class materials.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use shopfloor_core::{DomainError, DomainResult};

/// Cure-rate curve: colder shop → more catalyst, hotter → less.
///
/// `factor(T) = clamp(1 + coefficient * (reference - T), floor, ceiling)`
///
/// The policy is a plain value handed to the resolver. Two resolutions with the
/// same policy and temperature always agree.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct CurePolicy {
    reference_temp_c: Decimal,
    coefficient_per_degree: Decimal,
    floor: Decimal,
    ceiling: Decimal,
}

impl Default for CurePolicy {
    fn default() -> Self {
        Self {
            reference_temp_c: Decimal::from(20),
            coefficient_per_degree: Decimal::new(3, 2),
            floor: Decimal::new(5, 1),
            ceiling: Decimal::from(2),
        }
    }
}

impl CurePolicy {
    pub fn new(
        reference_temp_c: Decimal,
        coefficient_per_degree: Decimal,
        floor: Decimal,
        ceiling: Decimal,
    ) -> DomainResult<Self> {
        if coefficient_per_degree < Decimal::ZERO {
            return Err(DomainError::validation(
                "cure coefficient cannot be negative",
            ));
        }
        if floor <= Decimal::ZERO {
            return Err(DomainError::validation("cure floor must be positive"));
        }
        if ceiling < floor {
            return Err(DomainError::validation(
                "cure ceiling cannot be below the floor",
            ));
        }
        Ok(Self {
            reference_temp_c,
            coefficient_per_degree,
            floor,
            ceiling,
        })
    }

    pub fn floor(&self) -> Decimal {
        self.floor
    }

    pub fn ceiling(&self) -> Decimal {
        self.ceiling
    }

    pub fn reference_temp_c(&self) -> Decimal {
        self.reference_temp_c
    }

    pub fn coefficient_per_degree(&self) -> Decimal {
        self.coefficient_per_degree
    }

    /// Multiplier applied to the base catalyst quantity at `ambient_c`.
    pub fn factor(&self, ambient_c: Decimal) -> Decimal {
        let raw = Decimal::ONE + self.coefficient_per_degree * (self.reference_temp_c - ambient_c);
        raw.clamp(self.floor, self.ceiling)
    }

    /// Compensated quantity, rounded up to 4 dp so it never dips under
    /// `base * floor`.
    pub fn compensate(&self, base: Decimal, ambient_c: Decimal) -> Decimal {
        (base * self.factor(ambient_c))
            .round_dp_with_strategy(4, RoundingStrategy::ToPositiveInfinity)
    }
}
