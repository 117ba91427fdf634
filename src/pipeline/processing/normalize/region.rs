use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::domain::Region;

/// (code, full name, region) for every state, DC and the territories we bucket
const STATES: &[(&str, &str, Region)] = &[
    ("CT", "Connecticut", Region::Northeast),
    ("ME", "Maine", Region::Northeast),
    ("MA", "Massachusetts", Region::Northeast),
    ("NH", "New Hampshire", Region::Northeast),
    ("RI", "Rhode Island", Region::Northeast),
    ("VT", "Vermont", Region::Northeast),
    ("NJ", "New Jersey", Region::Northeast),
    ("NY", "New York", Region::Northeast),
    ("PA", "Pennsylvania", Region::Northeast),
    ("IL", "Illinois", Region::Midwest),
    ("IN", "Indiana", Region::Midwest),
    ("MI", "Michigan", Region::Midwest),
    ("OH", "Ohio", Region::Midwest),
    ("WI", "Wisconsin", Region::Midwest),
    ("IA", "Iowa", Region::Midwest),
    ("KS", "Kansas", Region::Midwest),
    ("MN", "Minnesota", Region::Midwest),
    ("MO", "Missouri", Region::Midwest),
    ("NE", "Nebraska", Region::Midwest),
    ("ND", "North Dakota", Region::Midwest),
    ("SD", "South Dakota", Region::Midwest),
    ("DE", "Delaware", Region::Southeast),
    ("DC", "District of Columbia", Region::Southeast),
    ("FL", "Florida", Region::Southeast),
    ("GA", "Georgia", Region::Southeast),
    ("MD", "Maryland", Region::Southeast),
    ("NC", "North Carolina", Region::Southeast),
    ("SC", "South Carolina", Region::Southeast),
    ("VA", "Virginia", Region::Southeast),
    ("WV", "West Virginia", Region::Southeast),
    ("AL", "Alabama", Region::Southeast),
    ("KY", "Kentucky", Region::Southeast),
    ("MS", "Mississippi", Region::Southeast),
    ("TN", "Tennessee", Region::Southeast),
    ("AR", "Arkansas", Region::Southeast),
    ("LA", "Louisiana", Region::Southeast),
    ("AZ", "Arizona", Region::Southwest),
    ("NM", "New Mexico", Region::Southwest),
    ("OK", "Oklahoma", Region::Southwest),
    ("TX", "Texas", Region::Southwest),
    ("CO", "Colorado", Region::West),
    ("ID", "Idaho", Region::West),
    ("MT", "Montana", Region::West),
    ("NV", "Nevada", Region::West),
    ("UT", "Utah", Region::West),
    ("WY", "Wyoming", Region::West),
    ("AK", "Alaska", Region::West),
    ("CA", "California", Region::West),
    ("HI", "Hawaii", Region::West),
    ("OR", "Oregon", Region::West),
    ("WA", "Washington", Region::West),
];

/// Lowercased code or full name -> region
static REGION_LOOKUP: Lazy<HashMap<String, Region>> = Lazy::new(|| {
    let mut map = HashMap::with_capacity(STATES.len() * 2);
    for (code, name, region) in STATES {
        map.insert(code.to_lowercase(), *region);
        map.insert(name.to_lowercase(), *region);
    }
    map
});

/// Region for a state given as a 2-letter code or full name; unmapped -> Other
pub fn region_for_state(state: &str) -> Region {
    REGION_LOOKUP
        .get(&state.trim().to_lowercase())
        .copied()
        .unwrap_or(Region::Other)
}
