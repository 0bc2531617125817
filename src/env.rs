//! Compile-time constants visible to expressions.
//!
//! The base environment exposes the record types' enumeration constants so
//! queries can say `person.gender == Person.FEMALE` instead of `== 0`.

use crate::value::Value;
use std::collections::HashMap;

pub type Env = HashMap<String, Value>;

fn namespace(constants: &[(&str, i64)]) -> Value {
    Value::Object(
        constants
            .iter()
            .map(|(name, value)| (name.to_string(), Value::Integer(*value)))
            .collect(),
    )
}

/// Base environment of record-type constants.
pub fn base_env() -> Env {
    let mut env = Env::new();
    env.insert(
        "Person".to_string(),
        namespace(&[("FEMALE", 0), ("MALE", 1), ("UNKNOWN", 2), ("OTHER", 3)]),
    );
    env.insert(
        "EventType".to_string(),
        namespace(&[
            ("UNKNOWN", -1),
            ("CUSTOM", 0),
            ("MARRIAGE", 1),
            ("MARR_SETTL", 2),
            ("MARR_LIC", 3),
            ("MARR_CONTR", 4),
            ("MARR_BANNS", 5),
            ("ENGAGEMENT", 6),
            ("DIVORCE", 7),
            ("DIV_FILING", 8),
            ("ANNULMENT", 9),
            ("MARR_ALT", 10),
            ("ADOPT", 11),
            ("BIRTH", 12),
            ("DEATH", 13),
            ("ADULT_CHRISTEN", 14),
            ("BAPTISM", 15),
            ("BAR_MITZVAH", 16),
            ("BAS_MITZVAH", 17),
            ("BLESS", 18),
            ("BURIAL", 19),
            ("CAUSE_DEATH", 20),
            ("CENSUS", 21),
            ("CHRISTEN", 22),
            ("CONFIRMATION", 23),
            ("CREMATION", 24),
            ("DEGREE", 25),
            ("EDUCATION", 26),
            ("ELECTED", 27),
            ("EMIGRATION", 28),
            ("FIRST_COMMUN", 29),
            ("IMMIGRATION", 30),
            ("GRADUATION", 31),
            ("MED_INFO", 32),
            ("MILITARY_SERV", 33),
            ("NATURALIZATION", 34),
            ("NOB_TITLE", 35),
            ("NUM_MARRIAGES", 36),
            ("OCCUPATION", 37),
            ("ORDINATION", 38),
            ("PROBATE", 39),
            ("PROPERTY", 40),
            ("RELIGION", 41),
            ("RESIDENCE", 42),
            ("RETIREMENT", 43),
            ("WILL", 44),
        ]),
    );
    env.insert(
        "EventRoleType".to_string(),
        namespace(&[
            ("UNKNOWN", -1),
            ("CUSTOM", 0),
            ("PRIMARY", 1),
            ("CLERGY", 2),
            ("CELEBRANT", 3),
            ("AIDE", 4),
            ("BRIDE", 5),
            ("GROOM", 6),
            ("WITNESS", 7),
            ("FAMILY", 8),
            ("INFORMANT", 9),
        ]),
    );
    env.insert(
        "FamilyRelType".to_string(),
        namespace(&[
            ("MARRIED", 0),
            ("UNMARRIED", 1),
            ("CIVIL_UNION", 2),
            ("UNKNOWN", 3),
            ("CUSTOM", 4),
        ]),
    );
    env.insert(
        "ChildRefType".to_string(),
        namespace(&[
            ("NONE", 0),
            ("BIRTH", 1),
            ("ADOPTED", 2),
            ("STEPCHILD", 3),
            ("SPONSORED", 4),
            ("FOSTER", 5),
            ("UNKNOWN", 6),
            ("CUSTOM", 7),
        ]),
    );
    env
}

/// Base environment with `extra` merged over it; caller entries win.
pub fn with_extras(extra: Env) -> Env {
    let mut env = base_env();
    env.extend(extra);
    env
}
