//! A profile bundles everything one engine instance needs in one TOML file:
//!
//! ```toml
//! [engine]
//! max_cycles = 5
//!
//! [[organ]]
//! name = "listening"
//! [[organ.entry]]
//! keyword = "hear"
//! atom = "attention"
//! weight = 0.8
//!
//! [[meta_atom]]
//! atom = "attention"
//! organs = ["listening", "empathy"]
//! rule = "any"
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::engine::Concrescence;
use crate::error::ConfigError;
use crate::lexicon::{LexiconOrgan, LexiconSpec};
use crate::meta_atom::{MetaAtomSpec, MetaAtomTable};
use crate::organ::{Organ, OrganRegistry};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default, rename = "organ")]
    pub organs: Vec<LexiconSpec>,
    #[serde(default, rename = "meta_atom")]
    pub meta_atoms: Vec<MetaAtomSpec>,
}

/// Counts reported by `prehend check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    pub organs: usize,
    pub keywords: usize,
    pub meta_atoms: usize,
}

impl Profile {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn registry(&self) -> Result<OrganRegistry, ConfigError> {
        let organs = self
            .organs
            .iter()
            .map(|spec| LexiconOrgan::from_spec(spec).map(|o| Arc::new(o) as Arc<dyn Organ>))
            .collect::<Result<Vec<_>, _>>()?;
        OrganRegistry::from_organs(organs)
    }

    pub fn meta_atom_table(&self, registry: &OrganRegistry) -> Result<MetaAtomTable, ConfigError> {
        MetaAtomTable::new(self.meta_atoms.clone(), &registry.names())
    }

    /// Validate every section and build a ready engine.
    pub fn build(&self) -> Result<Concrescence, ConfigError> {
        let registry = self.registry()?;
        let table = self.meta_atom_table(&registry)?;
        Concrescence::new(self.engine.clone(), registry, table)
    }

    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            organs: self.organs.len(),
            keywords: self.organs.iter().map(|o| o.entries.len()).sum(),
            meta_atoms: self.meta_atoms.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"
        [engine]
        max_cycles = 3

        [[organ]]
        name = "listening"
        [[organ.entry]]
        keyword = "hear"
        atom = "attention"
        weight = 0.8

        [[organ]]
        name = "empathy"
        base_lure = 0.9
        [[organ.entry]]
        keyword = "hear"
        atom = "attention"
        weight = 0.7
        [[organ.entry]]
        keyword = "lost"
        atom = "grief"
        weight = 0.9

        [[meta_atom]]
        atom = "attention"
        organs = ["listening", "empathy"]
        expression = "I'm listening."
    "#;

    #[test]
    fn test_parse_sections() {
        let p = Profile::from_toml_str(PROFILE).unwrap();
        assert_eq!(p.engine.max_cycles, 3);
        assert_eq!(p.engine.nexus.min_participants, 2);
        assert_eq!(p.organs.len(), 2);
        assert_eq!(p.organs[1].base_lure, 0.9);
        assert_eq!(p.organs[0].base_lure, 1.0);
        assert_eq!(
            p.summary(),
            ProfileSummary {
                organs: 2,
                keywords: 3,
                meta_atoms: 1
            }
        );
    }

    #[test]
    fn test_build_engine() {
        let engine = Profile::from_toml_str(PROFILE).unwrap().build().unwrap();
        assert_eq!(engine.organs().names(), vec!["listening", "empathy"]);
        assert_eq!(engine.meta_atoms().len(), 1);
    }

    #[test]
    fn test_unknown_organ_in_meta_atom() {
        let bad = PROFILE.replace(r#"["listening", "empathy"]"#, r#"["listening", "wisdom"]"#);
        let err = Profile::from_toml_str(&bad).unwrap().build().err().unwrap();
        assert_eq!(
            err,
            ConfigError::UnknownOrgan {
                atom: "attention".into(),
                organ: "wisdom".into()
            }
        );
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            Profile::from_toml_str("[[organ]\nname = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_empty_profile_has_no_organs() {
        let err = Profile::default().build().err().unwrap();
        assert!(matches!(err, ConfigError::InvalidEngine(_)));
    }
}
