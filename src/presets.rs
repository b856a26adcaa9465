use clap::ValueEnum;
use std::path::Path;

use crate::listing::FieldType::{self, Number, Text};
use crate::listing::{ListConfig, MinimumSample};

/// The precomputed tables published by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatasetKind {
    Providers,
    Drugs,
    Specialties,
    States,
    Combinations,
}

fn names(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

fn typed(fields: &[(&str, FieldType)]) -> Vec<(String, FieldType)> {
    fields.iter().map(|(f, t)| (f.to_string(), *t)).collect()
}

impl DatasetKind {
    /// Guess the table from a file name such as `providers.json` or `top-drugs.json`.
    pub fn detect(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?.to_lowercase();
        // Combinations first, their files usually mention drugs and specialties too.
        [
            ("combination", DatasetKind::Combinations),
            ("provider", DatasetKind::Providers),
            ("prescriber", DatasetKind::Providers),
            ("specialt", DatasetKind::Specialties),
            ("state", DatasetKind::States),
            ("drug", DatasetKind::Drugs),
        ]
        .into_iter()
        .find(|(pattern, _)| stem.contains(pattern))
        .map(|(_, kind)| kind)
    }

    pub fn title(self) -> &'static str {
        match self {
            DatasetKind::Providers => "Providers",
            DatasetKind::Drugs => "Drugs",
            DatasetKind::Specialties => "Specialties",
            DatasetKind::States => "States",
            DatasetKind::Combinations => "Specialty × Drug",
        }
    }

    pub fn list_config(self) -> ListConfig {
        match self {
            DatasetKind::Providers => ListConfig::new("riskScore", 50)
                .with_search_fields(names(&["name", "city", "state", "specialty", "npi"]))
                .with_sort_fields(typed(&[
                    ("name", Text),
                    ("city", Text),
                    ("state", Text),
                    ("specialty", Text),
                    ("claims", Number),
                    ("cost", Number),
                    ("opioidRate", Number),
                    ("riskScore", Number),
                ]))
                .with_category_field("riskLevel".to_string())
                .with_identity_field("npi".to_string()),
            DatasetKind::Drugs => ListConfig::new("cost", 50)
                .with_search_fields(names(&["brandName", "genericName"]))
                .with_sort_fields(typed(&[
                    ("brandName", Text),
                    ("genericName", Text),
                    ("claims", Number),
                    ("cost", Number),
                    ("costPerClaim", Number),
                    ("prescribers", Number),
                ]))
                .with_identity_field("brandName".to_string()),
            DatasetKind::Specialties => ListConfig::new("cost", 25)
                .with_search_fields(names(&["specialty"]))
                .with_sort_fields(typed(&[
                    ("specialty", Text),
                    ("providers", Number),
                    ("claims", Number),
                    ("cost", Number),
                    ("avgRiskScore", Number),
                    ("opioidRate", Number),
                ]))
                .with_minimum_sample(MinimumSample {
                    field: "providers".to_string(),
                    min: 100.0,
                })
                .with_identity_field("specialty".to_string()),
            DatasetKind::States => ListConfig::new("cost", 25)
                .with_search_fields(names(&["state", "stateName"]))
                .with_sort_fields(typed(&[
                    ("state", Text),
                    ("stateName", Text),
                    ("providers", Number),
                    ("claims", Number),
                    ("cost", Number),
                    ("costPerProvider", Number),
                    ("opioidRate", Number),
                ]))
                .with_identity_field("state".to_string()),
            DatasetKind::Combinations => ListConfig::new("cost", 50)
                .with_search_fields(names(&["specialty", "drug"]))
                .with_sort_fields(typed(&[
                    ("specialty", Text),
                    ("drug", Text),
                    ("providers", Number),
                    ("claims", Number),
                    ("cost", Number),
                ]))
                .with_minimum_sample(MinimumSample {
                    field: "claims".to_string(),
                    min: 50.0,
                })
                .with_identity_field("drug".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::listing::ListController;
    use std::path::PathBuf;

    const ALL: [DatasetKind; 5] = [
        DatasetKind::Providers,
        DatasetKind::Drugs,
        DatasetKind::Specialties,
        DatasetKind::States,
        DatasetKind::Combinations,
    ];

    #[test]
    fn presets_sort_by_a_declared_field() {
        for kind in ALL {
            let config = kind.list_config();
            assert!(
                config.is_sortable(&config.default_sort),
                "{kind:?} default sort is not sortable"
            );
            assert!(!config.search_fields.is_empty());
            assert!(config.page_size == 25 || config.page_size == 50);
        }
    }

    #[test]
    fn only_providers_have_categories() {
        for kind in ALL {
            let config = kind.list_config();
            assert_eq!(
                config.category_field.is_some(),
                kind == DatasetKind::Providers
            );
        }
    }

    #[test]
    fn detect_from_file_name() {
        assert_eq!(
            DatasetKind::detect(Path::new("data/providers.json")),
            Some(DatasetKind::Providers)
        );
        assert_eq!(
            DatasetKind::detect(Path::new("top-drugs.json")),
            Some(DatasetKind::Drugs)
        );
        assert_eq!(
            DatasetKind::detect(Path::new("specialty-drug-combinations.json")),
            Some(DatasetKind::Combinations)
        );
        assert_eq!(
            DatasetKind::detect(Path::new("/tmp/State_Summary.csv")),
            Some(DatasetKind::States)
        );
        assert_eq!(DatasetKind::detect(Path::new("misc.json")), None);
    }

    #[test]
    fn providers_fixture_with_preset() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("providers.json");
        let kind = DatasetKind::detect(&path).unwrap();
        let dataset = Dataset::load(path).unwrap();
        let mut list = ListController::new(dataset.records.clone(), kind.list_config());

        {
            let view = list.view();
            assert_eq!(view.total, 5);
            assert_eq!(view.rows[0].get("name").display(), "Mohammed Khalil");
            assert_eq!(view.rows[4].get("name").display(), "Mary Cibull");
        }

        assert_eq!(list.categories(), vec!["All", "low", "moderate", "elevated"]);
        list.on_category_filter_change("moderate");
        assert_eq!(list.view().total, 2);

        list.on_query_change("OH");
        let names: Vec<String> = list
            .view()
            .rows
            .iter()
            .map(|r| r.get("name").display())
            .collect();
        assert_eq!(names, vec!["Jennifer Velotta"]);

        list.on_category_filter_change("high");
        assert_eq!(list.view().total, 0);
    }
}
