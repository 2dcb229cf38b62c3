//! Encoder Bank: label → integer code tables fixed at training time.

use std::{collections::BTreeMap, fs, path::Path};

use crate::error::StartupError;
use crate::labels::{
    CongestionLevel, DayOfWeek, Label, PopulationDensity, PublicHoliday, Rainfall, RoadName,
};

/// Code table for one field. Codes are the label's index in the trained
/// class list; every variant of `L` has exactly one code.
#[derive(Debug, Clone)]
pub struct LabelTable<L: Label> {
    codes: Vec<i64>, // indexed by L::ordinal()
    by_code: Vec<L>,
}

impl<L: Label> LabelTable<L> {
    pub fn from_classes(classes: &[String]) -> Result<Self, StartupError> {
        let mut codes: Vec<Option<i64>> = vec![None; L::all().len()];
        let mut by_code = Vec::with_capacity(classes.len());

        for (code, class) in classes.iter().enumerate() {
            let label = L::all()
                .iter()
                .copied()
                .find(|l| l.as_str() == class)
                .ok_or_else(|| StartupError::UnknownLabel {
                    field: L::FIELD,
                    label: class.clone(),
                })?;
            let slot = &mut codes[label.ordinal()];
            if slot.is_some() {
                return Err(StartupError::DuplicateLabel {
                    field: L::FIELD,
                    label: class.clone(),
                });
            }
            *slot = Some(code as i64);
            by_code.push(label);
        }

        let codes = L::all()
            .iter()
            .zip(codes)
            .map(|(label, code)| {
                code.ok_or_else(|| StartupError::MissingLabel {
                    field: L::FIELD,
                    label: label.as_str(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { codes, by_code })
    }

    pub fn encode(&self, label: L) -> i64 {
        self.codes[label.ordinal()]
    }

    pub fn decode(&self, code: usize) -> Option<L> {
        self.by_code.get(code).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_code.len()
    }

    /// Labels in code order.
    pub fn classes(&self) -> Vec<&'static str> {
        self.by_code.iter().map(|l| l.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct EncoderBank {
    pub day_of_week: LabelTable<DayOfWeek>,
    pub public_holiday: LabelTable<PublicHoliday>,
    pub road_name: LabelTable<RoadName>,
    pub population_density: LabelTable<PopulationDensity>,
    pub rainfall: LabelTable<Rainfall>,
    /// Target encoder, used to decode classifier output.
    pub congestion_level: LabelTable<CongestionLevel>,
}

/// Per-field label lists as exposed by `/model-info`.
pub type Categories = BTreeMap<&'static str, Vec<&'static str>>;

impl EncoderBank {
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        let txt = fs::read_to_string(path).map_err(|source| StartupError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let classes: BTreeMap<String, Vec<String>> =
            serde_json::from_str(&txt).map_err(|source| StartupError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_classes(&classes)
    }

    pub fn from_classes(classes: &BTreeMap<String, Vec<String>>) -> Result<Self, StartupError> {
        fn table<L: Label>(
            classes: &BTreeMap<String, Vec<String>>,
        ) -> Result<LabelTable<L>, StartupError> {
            let list = classes
                .get(L::FIELD)
                .ok_or(StartupError::MissingEncoder(L::FIELD))?;
            LabelTable::from_classes(list)
        }

        Ok(Self {
            day_of_week: table(classes)?,
            public_holiday: table(classes)?,
            road_name: table(classes)?,
            population_density: table(classes)?,
            rainfall: table(classes)?,
            congestion_level: table(classes)?,
        })
    }

    pub fn categories(&self) -> Categories {
        let mut out = BTreeMap::new();
        out.insert(DayOfWeek::FIELD, self.day_of_week.classes());
        out.insert(PublicHoliday::FIELD, self.public_holiday.classes());
        out.insert(RoadName::FIELD, self.road_name.classes());
        out.insert(PopulationDensity::FIELD, self.population_density.classes());
        out.insert(Rainfall::FIELD, self.rainfall.classes());
        out.insert(CongestionLevel::FIELD, self.congestion_level.classes());
        out
    }
}
