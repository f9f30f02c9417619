//! Meta-atom table: which organs may contribute to which shared atom.
//!
//! Parsed and validated once at startup; immutable afterwards. Schema errors
//! are load-time failures, never query-time ones.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How many contributing organs must qualify before a nexus forms. The
/// engine-wide `min_participants` floor always applies on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivationRule {
    #[default]
    Any,
    #[serde(rename = "threshold_n_of_m")]
    ThresholdNOfM { n: usize },
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaAtomSpec {
    pub atom: String,
    pub organs: Vec<String>,
    #[serde(default)]
    pub rule: ActivationRule,
    /// Surface text emitted when this atom's nexus wins the cascade.
    #[serde(default)]
    pub expression: Option<String>,
}

impl MetaAtomSpec {
    /// Participants this rule asks for, before the engine floor.
    pub fn rule_requirement(&self) -> usize {
        match self.rule {
            ActivationRule::Any => 1,
            ActivationRule::ThresholdNOfM { n } => n,
            ActivationRule::All => self.organs.len(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TableFile {
    #[serde(default, rename = "meta_atom")]
    meta_atoms: Vec<MetaAtomSpec>,
}

/// Validated, ordered meta-atom table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaAtomTable {
    entries: Vec<MetaAtomSpec>,
}

impl MetaAtomTable {
    /// Validate `entries` against the registered organ names.
    pub fn new(entries: Vec<MetaAtomSpec>, known_organs: &[&str]) -> Result<Self, ConfigError> {
        let mut seen_atoms = HashSet::new();
        for spec in &entries {
            let atom = spec.atom.trim();
            if atom.is_empty() {
                return Err(ConfigError::InvalidMetaAtom {
                    atom: spec.atom.clone(),
                    message: "atom name is empty".into(),
                });
            }
            if !seen_atoms.insert(atom.to_string()) {
                return Err(ConfigError::DuplicateAtom(atom.to_string()));
            }

            let mut seen_organs = HashSet::new();
            for organ in &spec.organs {
                if !known_organs.contains(&organ.as_str()) {
                    return Err(ConfigError::UnknownOrgan {
                        atom: atom.to_string(),
                        organ: organ.clone(),
                    });
                }
                if !seen_organs.insert(organ.as_str()) {
                    return Err(ConfigError::InvalidMetaAtom {
                        atom: atom.to_string(),
                        message: format!("organ '{organ}' listed twice"),
                    });
                }
            }
            if spec.organs.len() < 2 {
                return Err(ConfigError::InvalidMetaAtom {
                    atom: atom.to_string(),
                    message: "a meta-atom needs at least two contributing organs".into(),
                });
            }
            if let ActivationRule::ThresholdNOfM { n } = spec.rule
                && (n == 0 || n > spec.organs.len())
            {
                return Err(ConfigError::InvalidMetaAtom {
                    atom: atom.to_string(),
                    message: format!("threshold {n} not within 1..={}", spec.organs.len()),
                });
            }
        }
        Ok(Self { entries })
    }

    /// Parse a TOML document of `[[meta_atom]]` tables.
    pub fn from_toml_str(s: &str, known_organs: &[&str]) -> Result<Self, ConfigError> {
        let file: TableFile = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::new(file.meta_atoms, known_organs)
    }

    /// Parse a JSON array of meta-atom objects.
    pub fn from_json_str(s: &str, known_organs: &[&str]) -> Result<Self, ConfigError> {
        let entries: Vec<MetaAtomSpec> =
            serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::new(entries, known_organs)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetaAtomSpec> {
        self.entries.iter()
    }

    pub fn get(&self, atom: &str) -> Option<&MetaAtomSpec> {
        self.entries.iter().find(|e| e.atom == atom)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORGANS: &[&str] = &["listening", "empathy", "wisdom"];

    #[test]
    fn test_parse_toml() {
        let table = MetaAtomTable::from_toml_str(
            r#"
            [[meta_atom]]
            atom = "presence"
            organs = ["listening", "empathy"]
            expression = "I'm here."

            [[meta_atom]]
            atom = "clarity"
            organs = ["listening", "empathy", "wisdom"]
            rule = { threshold_n_of_m = { n = 3 } }

            [[meta_atom]]
            atom = "ground"
            organs = ["empathy", "wisdom"]
            rule = "all"
            "#,
            ORGANS,
        )
        .unwrap();
        assert_eq!(table.len(), 3);
        let atoms: Vec<&str> = table.iter().map(|e| e.atom.as_str()).collect();
        assert_eq!(atoms, vec!["presence", "clarity", "ground"]);
        assert_eq!(table.get("presence").unwrap().rule, ActivationRule::Any);
        assert_eq!(table.get("clarity").unwrap().rule_requirement(), 3);
        assert_eq!(table.get("ground").unwrap().rule_requirement(), 2);
    }

    #[test]
    fn test_parse_json() {
        let table = MetaAtomTable::from_json_str(
            r#"[{"atom": "presence", "organs": ["listening", "wisdom"], "rule": "any"}]"#,
            ORGANS,
        )
        .unwrap();
        assert_eq!(table.get("presence").unwrap().organs.len(), 2);
    }

    fn spec(atom: &str, organs: &[&str]) -> MetaAtomSpec {
        MetaAtomSpec {
            atom: atom.into(),
            organs: organs.iter().map(|s| s.to_string()).collect(),
            rule: ActivationRule::Any,
            expression: None,
        }
    }

    #[test]
    fn test_unknown_organ_rejected() {
        let err = MetaAtomTable::new(vec![spec("a", &["listening", "ghost"])], ORGANS).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownOrgan { atom: "a".into(), organ: "ghost".into() }
        );
    }

    #[test]
    fn test_duplicate_atom_rejected() {
        let err = MetaAtomTable::new(
            vec![spec("a", &["listening", "empathy"]), spec("a", &["empathy", "wisdom"])],
            ORGANS,
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateAtom("a".into()));
    }

    #[test]
    fn test_single_organ_rejected() {
        assert!(MetaAtomTable::new(vec![spec("a", &["listening"])], ORGANS).is_err());
    }

    #[test]
    fn test_repeated_organ_rejected() {
        assert!(MetaAtomTable::new(vec![spec("a", &["listening", "listening"])], ORGANS).is_err());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut s = spec("a", &["listening", "empathy"]);
        s.rule = ActivationRule::ThresholdNOfM { n: 3 };
        assert!(MetaAtomTable::new(vec![s.clone()], ORGANS).is_err());
        s.rule = ActivationRule::ThresholdNOfM { n: 0 };
        assert!(MetaAtomTable::new(vec![s], ORGANS).is_err());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = MetaAtomTable::from_toml_str("[[meta_atom]]\natom = 3", ORGANS).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
