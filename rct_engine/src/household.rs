use log::info;

use std::collections::HashMap;

use crate::config::{Household, MailPerson};

const HOUSEHOLD_PREFIX: &str = "Household of ";

/// Groups person-level records into one row per unique mailing address.
///
/// The household key is the trimmed (line 1, city, state, zip) tuple. Line 2
/// is excluded on purpose: apartment or unit differences at one street
/// address collapse to a single mail piece. Households come out in the order
/// their first member was encountered, and every input record belongs to
/// exactly one output household.
///
/// Records whose key fields are blank still form a (degenerate) household;
/// they are retained with `valid_mailing` set to false so callers can count
/// undeliverable targets instead of silently dropping them.
pub fn group_households(persons: &[MailPerson]) -> Vec<Household> {
    let mut key_pos: HashMap<(String, String, String, String), usize> = HashMap::new();
    let mut households: Vec<Household> = Vec::new();
    let mut members: Vec<Vec<String>> = Vec::new();

    for person in persons.iter() {
        let key = household_key(person);
        match key_pos.get(&key) {
            Some(&pos) => members[pos].push(person.full_name.trim().to_string()),
            None => {
                let valid_mailing = !key.0.is_empty() && !key.1.is_empty() && !key.3.is_empty();
                key_pos.insert(key.clone(), households.len());
                households.push(Household {
                    address_line1: key.0,
                    city: key.1,
                    state: key.2,
                    zip: key.3,
                    display_name: String::new(),
                    member_count: 0,
                    valid_mailing,
                });
                members.push(vec![person.full_name.trim().to_string()]);
            }
        }
    }

    for (household, names) in households.iter_mut().zip(members.into_iter()) {
        household.member_count = names.len();
        household.display_name = household_display_name(&names);
    }
    info!(
        "group_households: {} persons -> {} households",
        persons.len(),
        households.len()
    );
    households
}

/// Number of distinct households in a person-level list.
pub fn household_count(persons: &[MailPerson]) -> usize {
    let mut seen: HashMap<(String, String, String, String), ()> = HashMap::new();
    for person in persons.iter() {
        seen.insert(household_key(person), ());
    }
    seen.len()
}

/// Number of records that cannot be mailed: blank line 1, city or zip.
pub fn invalid_address_count(persons: &[MailPerson]) -> usize {
    persons
        .iter()
        .filter(|p| {
            p.address_line1.trim().is_empty()
                || p.city.trim().is_empty()
                || p.zip.trim().is_empty()
        })
        .count()
}

fn household_key(person: &MailPerson) -> (String, String, String, String) {
    (
        person.address_line1.trim().to_string(),
        person.city.trim().to_string(),
        person.state.trim().to_string(),
        person.zip.trim().to_string(),
    )
}

// A lone member that is already a household label keeps it verbatim, which
// makes re-aggregating an aggregated list a no-op.
fn household_display_name(names: &[String]) -> String {
    if let [single] = names {
        if single.starts_with(HOUSEHOLD_PREFIX) {
            return single.clone();
        }
    }
    format!("{}{}", HOUSEHOLD_PREFIX, names.join(" and "))
}
