use std::{fmt, net::Ipv4Addr, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::StorageError;

/// A single entry returned by a bucket listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub region: String,
}

/// Which bucket naming rules the backend enforces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NamingPolicy {
    /// Anything a mock would plausibly accept, including uppercase names.
    #[default]
    Relaxed,
    /// DNS-compatible names as enforced by real S3 endpoints.
    Strict,
}

impl FromStr for NamingPolicy {
    type Err = StorageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "relaxed" => Ok(Self::Relaxed),
            "strict" => Ok(Self::Strict),
            _ => Err(StorageError::InvalidPolicy(value.to_string())),
        }
    }
}

impl fmt::Display for NamingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relaxed => f.write_str("relaxed"),
            Self::Strict => f.write_str("strict"),
        }
    }
}

pub fn validate_bucket_name(name: &str, policy: NamingPolicy) -> Result<(), StorageError> {
    match policy {
        NamingPolicy::Relaxed => validate_relaxed(name),
        NamingPolicy::Strict => validate_strict(name),
    }
}

fn validate_relaxed(name: &str) -> Result<(), StorageError> {
    if name.is_empty() {
        return Err(StorageError::invalid_name(name, "bucket name cannot be empty"));
    }
    if name.len() > 255 {
        return Err(StorageError::invalid_name(
            name,
            "bucket name is longer than 255 characters",
        ));
    }
    if let Some(ch) = name
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')))
    {
        return Err(StorageError::invalid_name(
            name,
            format!("unsupported character `{ch}`"),
        ));
    }
    Ok(())
}

fn validate_strict(name: &str) -> Result<(), StorageError> {
    if !(3..=63).contains(&name.len()) {
        return Err(StorageError::invalid_name(
            name,
            "bucket name must be between 3 and 63 characters long",
        ));
    }
    if let Some(ch) = name
        .chars()
        .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '-' | '.')))
    {
        return Err(StorageError::invalid_name(
            name,
            format!("unsupported character `{ch}`"),
        ));
    }

    let bytes = name.as_bytes();
    let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !edge_ok(bytes[0]) || !edge_ok(bytes[bytes.len() - 1]) {
        return Err(StorageError::invalid_name(
            name,
            "bucket name must start and end with a letter or digit",
        ));
    }
    if name.contains("..") {
        return Err(StorageError::invalid_name(
            name,
            "bucket name cannot contain adjacent periods",
        ));
    }
    if name.parse::<Ipv4Addr>().is_ok() {
        return Err(StorageError::invalid_name(
            name,
            "bucket name cannot be formatted as an IP address",
        ));
    }
    Ok(())
}
