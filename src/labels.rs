//! Typed label domains for every categorical field the model was trained on.
//!
//! Each enum is the closed set of labels a request may carry for its field.
//! The encoder artifact is checked against these sets when it is loaded, so a
//! label that passes validation always has a code.

use serde::{Serialize, Serializer};
use std::fmt;

/// A categorical label with a fixed wire name and a closed variant set.
pub trait Label: Copy + Eq + fmt::Debug + 'static {
    /// Wire name of the field this label belongs to.
    const FIELD: &'static str;

    fn all() -> &'static [Self];
    fn as_str(self) -> &'static str;
    /// Accepts the canonical label and its known aliases.
    fn from_label(s: &str) -> Option<Self>;
    /// Position in `all()`, used to index encoder tables.
    fn ordinal(self) -> usize;
}

macro_rules! label_enum {
    (
        $(#[$meta:meta])*
        $name:ident : $field:literal {
            $( $variant:ident => $label:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $( $variant ),+
        }

        impl Label for $name {
            const FIELD: &'static str = $field;

            fn all() -> &'static [Self] {
                &[$($name::$variant),+]
            }

            fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            fn from_label(s: &str) -> Option<Self> {
                match s {
                    $( $label $(| $alias)* => Some($name::$variant), )+
                    _ => None,
                }
            }

            fn ordinal(self) -> usize {
                self as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

label_enum! {
    DayOfWeek: "Day_of_Week" {
        Monday => "Monday",
        Tuesday => "Tuesday",
        Wednesday => "Wednesday",
        Thursday => "Thursday",
        Friday => "Friday",
        Saturday => "Saturday",
        Sunday => "Sunday",
    }
}

label_enum! {
    PublicHoliday: "Public_Holiday" {
        Yes => "Yes",
        No => "No",
    }
}

label_enum! {
    /// Roads covered by the training data. Compact codes typed without the
    /// road suffix are accepted as aliases.
    RoadName: "Road_Name" {
        Kg7Ave => "KG 7 Ave" | "KG7",
        Kk15Rd => "KK 15 Rd" | "KK15",
        Kn1Rd => "KN 1 Rd" | "KN1",
        Kn3Rd => "KN 3 Rd" | "KN3",
        Kn4Rd => "KN 4 Rd" | "KN4",
        Kn5Rd => "KN 5 Rd" | "KN5",
        Rn1 => "RN1",
        Rn3 => "RN3",
    }
}

label_enum! {
    PopulationDensity: "Population_Density" {
        Medium => "Medium",
        High => "High",
    }
}

label_enum! {
    Rainfall: "Rainfall" {
        Yes => "Yes" | "Rain",
        No => "No" | "No Rain",
    }
}

label_enum! {
    /// Ordinal traffic-density category produced by the classifier.
    CongestionLevel: "Congestion_Level" {
        Low => "Low",
        Medium => "Medium",
        High => "High",
        Severe => "Severe",
    }
}

/// Input fields of a prediction request, in wire naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Hour,
    DayOfWeek,
    PublicHoliday,
    RoadName,
    PopulationDensity,
    Rainfall,
}

impl Field {
    /// Feature order used when a model artifact does not declare one.
    pub const DEFAULT_ORDER: [Field; 6] = [
        Field::Hour,
        Field::DayOfWeek,
        Field::PublicHoliday,
        Field::RoadName,
        Field::PopulationDensity,
        Field::Rainfall,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Hour => "Hour",
            Field::DayOfWeek => DayOfWeek::FIELD,
            Field::PublicHoliday => PublicHoliday::FIELD,
            Field::RoadName => RoadName::FIELD,
            Field::PopulationDensity => PopulationDensity::FIELD,
            Field::Rainfall => Rainfall::FIELD,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::DEFAULT_ORDER.into_iter().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical labels of `L`, in declaration order.
pub fn labels_of<L: Label>() -> Vec<&'static str> {
    L::all().iter().map(|l| l.as_str()).collect()
}
