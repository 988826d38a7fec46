// src/roster.rs
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::submission_store::{io_context, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub doctor_id: String,
    pub clinic: String,
    #[serde(rename = "fn")]
    pub first_name: String,
    #[serde(rename = "ln")]
    pub last_name: String,
    #[serde(rename = "tl_name", default)]
    pub team_leader: Option<String>,
}

impl Doctor {
    /// `<clinic> | <fn> | <ln>`, stored with every submission.
    pub fn display_name(&self) -> String {
        format!("{} | {} | {}", self.clinic, self.first_name, self.last_name)
    }

    pub fn short_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    doctors: Vec<Doctor>,
}

impl Roster {
    pub fn new(doctors: Vec<Doctor>) -> Self {
        Self { doctors }
    }

    /// A missing file yields an empty roster.
    pub fn load_csv(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            warn!("Doctor roster {:?} not found; continuing with an empty roster", path);
            return Ok(Self::default());
        }
        let file = std::fs::File::open(path)
            .map_err(|e| io_context(e, format!("Failed to open doctor roster: {:?}", path)))?;
        let mut reader = csv::Reader::from_reader(file);
        let mut doctors = Vec::new();
        for row in reader.deserialize::<Doctor>() {
            match row {
                Ok(doctor) if !doctor.doctor_id.trim().is_empty() => doctors.push(doctor),
                Ok(_) => warn!("Skipping roster row without doctor_id in {:?}", path),
                Err(e) => warn!("Skipping malformed roster row in {:?}: {}", path, e),
            }
        }
        info!("Loaded {} doctors from {:?}", doctors.len(), path);
        Ok(Self { doctors })
    }

    pub fn doctors(&self) -> &[Doctor] {
        &self.doctors
    }

    pub fn find(&self, doctor_id: &str) -> Option<&Doctor> {
        self.doctors.iter().find(|d| d.doctor_id == doctor_id)
    }

    pub fn is_empty(&self) -> bool {
        self.doctors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_roster_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doctors.csv");
        std::fs::write(
            &path,
            "doctor_id,clinic,fn,ln,tl_name\nDOC001,North,Ann,Lee,Maria\nDOC002,South,Bo,Ek,\n,Nowhere,X,Y,\n",
        )
        .unwrap();
        let roster = Roster::load_csv(&path).unwrap();
        assert_eq!(roster.doctors().len(), 2);
        let ann = roster.find("DOC001").unwrap();
        assert_eq!(ann.display_name(), "North | Ann | Lee");
        assert_eq!(ann.short_name(), "Ann Lee");
        assert_eq!(ann.team_leader.as_deref(), Some("Maria"));
        assert!(roster.find("DOC999").is_none());
    }

    #[test]
    fn missing_roster_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let roster = Roster::load_csv(&dir.path().join("absent.csv")).unwrap();
        assert!(roster.is_empty());
    }
}
