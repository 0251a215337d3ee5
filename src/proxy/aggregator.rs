//! Aggregation of check results into sorted per-protocol result sets

use crate::proxy::models::{Candidate, Protocol, WorkingProxy};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

/// One `.`/`:`-separated field of an address, compared numerically when it can be
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Field<'a> {
    Number(u64),
    Text(&'a str),
}

/// Sort key giving IP-block order: `2.2.2.2:80` before `10.0.0.1:80`
fn sort_key(address: &str) -> Vec<Field<'_>> {
    address
        .split(['.', ':'])
        .map(|field| match field.parse::<u64>() {
            Ok(n) => Field::Number(n),
            Err(_) => Field::Text(field),
        })
        .collect()
}

/// Numeric octet order, falling back to the raw text so the order is total
pub fn compare_addresses(a: &str, b: &str) -> Ordering {
    sort_key(a).cmp(&sort_key(b)).then_with(|| a.cmp(b))
}

/// Working proxies of one protocol, sorted by address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    proxies: Vec<WorkingProxy>,
}

impl ResultSet {
    /// Build a sorted set; entries sharing an address keep the first exit IP seen
    pub fn from_working(proxies: impl IntoIterator<Item = WorkingProxy>) -> Self {
        let mut seen = HashSet::new();
        let mut proxies: Vec<_> = proxies
            .into_iter()
            .filter(|p| seen.insert(p.candidate.address.clone()))
            .collect();
        proxies.sort_by(|a, b| compare_addresses(a.address(), b.address()));
        Self { proxies }
    }

    /// Every working proxy, transparent ones included
    pub fn all(&self) -> impl Iterator<Item = &WorkingProxy> {
        self.proxies.iter()
    }

    /// Working proxies whose exit IP differs from their own host
    pub fn anonymous(&self) -> impl Iterator<Item = &WorkingProxy> {
        self.proxies.iter().filter(|p| p.is_anonymous())
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn anonymous_count(&self) -> usize {
        self.anonymous().count()
    }
}

/// Candidates of every enabled protocol, deduplicated
pub type CandidateSets = BTreeMap<Protocol, HashSet<Candidate>>;

/// Sorted result sets keyed by protocol
pub type Results = BTreeMap<Protocol, ResultSet>;

/// Keep the candidates with a confirmed exit IP and sort them per protocol.
///
/// Every protocol present in `candidates` gets an entry, even if nothing in
/// it survived probing.
pub fn aggregate(
    candidates: &CandidateSets,
    exit_ips: &HashMap<Candidate, String>,
) -> Results {
    candidates
        .iter()
        .map(|(protocol, set)| {
            let working = set.iter().filter_map(|candidate| {
                exit_ips
                    .get(candidate)
                    .map(|ip| WorkingProxy::new(candidate.clone(), ip.clone()))
            });
            (*protocol, ResultSet::from_working(working))
        })
        .collect()
}
