use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

const HUNDREDTHS_PER_POINT: i64 = 100;

//--------------------------------------       Points        ---------------------------------------------------------
/// A loyalty points amount, held as an integer number of hundredths of a point.
///
/// Keeping the value integral means balances can be adjusted with additive SQL (`balance = balance + $1`) without any
/// floating point drift. On the wire, `Points` is a plain JSON number with up to two decimal places, e.g. `729.98`.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[sqlx(transparent)]
pub struct Points(i64);

macro_rules! arithmetic {
    ($($op:ident::$method:ident, $assign:ident::$assign_method:ident);* $(;)?) => {$(
        impl $op for Points {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self {
                Self(self.0.$method(rhs.0))
            }
        }

        impl $assign for Points {
            fn $assign_method(&mut self, rhs: Self) {
                self.0.$assign_method(rhs.0)
            }
        }
    )*};
}

arithmetic!(Add::add, AddAssign::add_assign; Sub::sub, SubAssign::sub_assign);

impl Neg for Points {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Sum for Points {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as points: {0}")]
pub struct PointsConversionError(String);

impl From<i64> for Points {
    /// Converts a raw number of hundredths into `Points`.
    fn from(hundredths: i64) -> Self {
        Self(hundredths)
    }
}

impl TryFrom<f64> for Points {
    type Error = PointsConversionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(PointsConversionError(format!("{value} is not a finite number")));
        }
        if value < 0.0 {
            return Err(PointsConversionError(format!("{value} is negative")));
        }
        let hundredths = (value * HUNDREDTHS_PER_POINT as f64).round();
        if hundredths > Points::MAX.0 as f64 {
            return Err(PointsConversionError(format!("{value} is larger than {}", Points::MAX)));
        }
        #[allow(clippy::cast_possible_truncation)]
        let hundredths = hundredths as i64;
        Ok(Self(hundredths))
    }
}

impl Display for Points {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = HUNDREDTHS_PER_POINT.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / per, abs % per)
    }
}

impl Serialize for Points {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Points {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Points::try_from(value).map_err(D::Error::custom)
    }
}

impl Points {
    /// The largest amount any single value or balance may hold: ten trillion points. Well inside both `i64` and the
    /// integers an `f64` represents exactly, so adding two amounts below it never overflows.
    pub const MAX: Points = Points(1_000_000_000_000_000);

    /// The raw value, in hundredths of a point.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_points(points: i64) -> Self {
        Self(points * HUNDREDTHS_PER_POINT)
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / HUNDREDTHS_PER_POINT as f64
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}
