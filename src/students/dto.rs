use serde::{Deserialize, Deserializer, Serialize};

use crate::students::repo_types::Student;

/// A field of a partial update: either left out of the request or given a value.
///
/// A missing key and an explicit JSON `null` are both `Absent`; any value,
/// the empty string included, is `Set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Absent,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Absent
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Patch::Set(v),
            None => Patch::Absent,
        })
    }
}

impl<T> Patch<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Patch::Set(_))
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Patch::Set(v) => Some(v),
            Patch::Absent => None,
        }
    }

    fn apply_to(&self, target: &mut T)
    where
        T: Clone,
    {
        if let Patch::Set(v) = self {
            *target = v.clone();
        }
    }
}

/// Request body for creating a student.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentCreate {
    pub nim: String,
    pub nama: String,
    pub email: String,
    pub program_studi: String,
    pub angkatan: i32,
}

/// Request body for updating a student; any subset of fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StudentUpdate {
    pub nim: Patch<String>,
    pub nama: Patch<String>,
    pub email: Patch<String>,
    pub program_studi: Patch<String>,
    pub angkatan: Patch<i32>,
}

impl StudentUpdate {
    pub fn is_empty(&self) -> bool {
        !(self.nim.is_set()
            || self.nama.is_set()
            || self.email.is_set()
            || self.program_studi.is_set()
            || self.angkatan.is_set())
    }

    /// Copy every provided field onto `student`. Timestamps are left alone.
    pub fn apply(&self, student: &mut Student) {
        self.nim.apply_to(&mut student.nim);
        self.nama.apply_to(&mut student.nama);
        self.email.apply_to(&mut student.email);
        self.program_studi.apply_to(&mut student.program_studi);
        self.angkatan.apply_to(&mut student.angkatan);
    }
}

/// Query string of `GET /students`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentFilter {
    pub search: Option<String>,
    pub program_studi: Option<String>,
    pub angkatan: Option<i32>,
}

impl StudentFilter {
    /// Drop empty text filters so they behave as if they were not given.
    /// Whitespace is a real search term.
    pub fn normalized(self) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        Self {
            search: non_empty(self.search),
            program_studi: non_empty(self.program_studi),
            angkatan: self.angkatan,
        }
    }

    /// Case-insensitive substring semantics; all given filters must hold.
    pub fn matches(&self, student: &Student) -> bool {
        let contains = |haystack: &str, needle: &str| {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        };
        if let Some(q) = &self.search {
            if !(contains(&student.nama, q) || contains(&student.nim, q) || contains(&student.email, q)) {
                return false;
            }
        }
        if let Some(p) = &self.program_studi {
            if !contains(&student.program_studi, p) {
                return false;
            }
        }
        if let Some(year) = self.angkatan {
            if student.angkatan != year {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
