//! ID resolver module
//!
//! Handles resolution of UUID prefixes to full UUIDs by querying the API.
//! This allows users to specify short, unambiguous prefixes instead of full UUIDs.
//! Categories can also be named.

use anyhow::{Context, Result, anyhow};
use pulse_client::PulseClient;
use uuid::Uuid;

use crate::types::IdOrPrefix;

/// Pick the single ID matching `id_or_prefix`
///
/// # Errors
/// Returns an error if no ID or more than one ID matches.
pub fn pick_unique(kind: &str, id_or_prefix: &IdOrPrefix, ids: &[Uuid]) -> Result<Uuid> {
    let matches: Vec<&Uuid> = ids.iter().filter(|id| id_or_prefix.matches(id)).collect();

    match matches.as_slice() {
        [] => Err(anyhow!(
            "No {} found with ID starting with '{}'",
            kind,
            id_or_prefix
        )),
        [id] => Ok(**id),
        _ => {
            let ids: Vec<String> = matches.iter().map(|id| id.to_string()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple {}s: {}",
                id_or_prefix,
                kind,
                ids.join(", ")
            ))
        }
    }
}

/// Resolve a job ID or prefix to a full UUID
///
/// If the input is already a full UUID, returns it immediately.
/// Otherwise, fetches the job history and finds the one matching the prefix.
pub async fn resolve_job_id(client: &PulseClient, input: &str) -> Result<Uuid> {
    let id_or_prefix = IdOrPrefix::parse(input);
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let jobs = client
        .list_jobs()
        .await
        .context("Failed to fetch jobs for ID resolution")?;
    let ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();

    pick_unique("job", &id_or_prefix, &ids)
}

/// Resolve an account ID or prefix to a full UUID
pub async fn resolve_account_id(client: &PulseClient, input: &str) -> Result<Uuid> {
    let id_or_prefix = IdOrPrefix::parse(input);
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let accounts = client
        .list_accounts(None)
        .await
        .context("Failed to fetch accounts for ID resolution")?;
    let ids: Vec<Uuid> = accounts.iter().map(|a| a.id).collect();

    pick_unique("account", &id_or_prefix, &ids)
}

/// Resolve a category name, ID or prefix to a full UUID
///
/// An exact (case-insensitive) name match wins over a prefix match.
pub async fn resolve_category_id(client: &PulseClient, input: &str) -> Result<Uuid> {
    let id_or_prefix = IdOrPrefix::parse(input);
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let categories = client
        .list_categories()
        .await
        .context("Failed to fetch categories for ID resolution")?;

    if let Some(category) = categories
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(input.trim()))
    {
        return Ok(category.id);
    }

    let ids: Vec<Uuid> = categories.iter().map(|c| c.id).collect();
    pick_unique("category", &id_or_prefix, &ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Uuid {
        Uuid::parse_str(s).unwrap()
    }

    #[test]
    fn test_pick_unique() {
        let a = id("aaaa0000-0000-4000-8000-000000000001");
        let b = id("aaab0000-0000-4000-8000-000000000002");
        let ids = [a, b];

        assert_eq!(pick_unique("job", &IdOrPrefix::parse("aaaa"), &ids).unwrap(), a);
        assert!(pick_unique("job", &IdOrPrefix::parse("aaa"), &ids).is_err());
        assert!(pick_unique("job", &IdOrPrefix::parse("ffff"), &ids).is_err());
    }

    #[test]
    fn test_ambiguous_error_lists_candidates() {
        let a = id("aaaa0000-0000-4000-8000-000000000001");
        let b = id("aaab0000-0000-4000-8000-000000000002");

        let err = pick_unique("account", &IdOrPrefix::parse("aa"), &[a, b]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("multiple accounts"));
        assert!(message.contains(&a.to_string()));
    }
}
