use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::User;

/// The closed set of columns a view may sort on. Anything outside this
/// enumeration is rejected when the directive is built, not when it is
/// applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Name,
    Email,
    Phone,
    Website,
    Company,
}

impl SortField {
    pub const ALL: [SortField; 5] = [
        SortField::Name,
        SortField::Email,
        SortField::Phone,
        SortField::Website,
        SortField::Company,
    ];

    /// The record value this field orders by.
    pub fn key<'a>(&self, user: &'a User) -> &'a str {
        match self {
            SortField::Name => &user.name,
            SortField::Email => &user.email,
            SortField::Phone => &user.phone,
            SortField::Website => &user.website,
            SortField::Company => &user.company.name,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Email => "email",
            SortField::Phone => "phone",
            SortField::Website => "website",
            SortField::Company => "company",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort field '{0}', expected one of: name, email, phone, website, company")]
pub struct UnknownSortField(pub String);

impl FromStr for SortField {
    type Err = UnknownSortField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(SortField::Name),
            "email" => Ok(SortField::Email),
            "phone" => Ok(SortField::Phone),
            "website" => Ok(SortField::Website),
            "company" => Ok(SortField::Company),
            _ => Err(UnknownSortField(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortDirective {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortDirective {
    pub fn ascending(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Descending,
        }
    }
}

impl Default for SortDirective {
    fn default() -> Self {
        Self::ascending(SortField::Name)
    }
}

/// A 1-based page selection. Construction clamps both fields to at least
/// one, so a zero page or zero page size is never representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Index of the first record on this page.
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }
}
