//! Permitted localities.

use std::collections::HashSet;

/// Makhachkala, Kaspiysk and the districts, settlements and neighbourhoods
/// that belong to them, as reverse geocoders name them.
pub const DEFAULT_LOCALITIES: &[&str] = &[
    // Cities
    "махачкала",
    "каспийск",
    // Makhachkala districts
    "кировский район",
    "ленинский район",
    "советский район",
    // Kirovsky district settlements
    "ленинкент",
    "семендер",
    "сулак",
    "шамхал",
    "богатырёвка",
    "красноармейское",
    "остров чечень",
    "шамхал-термен",
    // Leninsky district settlements
    "новый кяхулай",
    "новый хушет",
    "талги",
    // Sovetsky district settlements
    "альбурикент",
    "кяхулай",
    "тарки",
    // Neighbourhoods
    "5-й посёлок",
    "5 посёлок",
    "каменный карьер",
    "афган-городок",
    "кемпинг",
    "кирпичный",
    "ккоз",
    "тау",
    "центральный",
    "южный",
    "рекреационная зона",
    "финский квартал",
    // Suburbs
    "турали",
];

/// Exact, case-insensitive locality match with a global override.
#[derive(Debug, Clone)]
pub struct AllowList {
    localities: HashSet<String>,
    allow_all: bool,
}

impl AllowList {
    pub fn new<I, S>(localities: I, allow_all: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            localities: localities
                .into_iter()
                .map(|l| l.as_ref().trim().to_lowercase())
                .collect(),
            allow_all,
        }
    }

    /// The built-in locality list.
    pub fn standard(allow_all: bool) -> Self {
        Self::new(DEFAULT_LOCALITIES.iter().copied(), allow_all)
    }

    /// Whether location gating is switched off.
    pub fn allow_all(&self) -> bool {
        self.allow_all
    }

    pub fn is_allowed(&self, city: &str) -> bool {
        self.allow_all || self.localities.contains(&city.trim().to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_members_allowed() {
        let list = AllowList::standard(false);
        assert!(list.is_allowed("махачкала"));
        assert!(list.is_allowed("каспийск"));
        assert!(list.is_allowed("шамхал-термен"));
    }

    #[test]
    fn test_case_insensitive() {
        let list = AllowList::standard(false);
        assert!(list.is_allowed("Махачкала"));
        assert!(list.is_allowed(" КАСПИЙСК "));
    }

    #[test]
    fn test_no_partial_matches() {
        let list = AllowList::standard(false);
        assert!(!list.is_allowed("махачкала-2"));
        assert!(!list.is_allowed("шамхал термен"));
        assert!(!list.is_allowed("москва"));
        assert!(!list.is_allowed(""));
    }

    #[test]
    fn test_override_allows_everything() {
        let list = AllowList::standard(true);
        assert!(list.allow_all());
        assert!(list.is_allowed("москва"));
        assert!(list.is_allowed(""));
    }

    #[test]
    fn test_custom_list() {
        let list = AllowList::new(["Springfield"], false);
        assert!(list.is_allowed("springfield"));
        assert!(!list.is_allowed("shelbyville"));
    }
}
