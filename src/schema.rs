//! Static type schema of the JSON record documents.
//!
//! Maps `table → attribute path → FieldType`. Array elements are written
//! with an empty index (`event_ref_list[].role.value`); lookups normalise
//! any concrete index (`[0]`, `[person.birth_ref_index]`) to `[]` first.

use crate::ast::{BinOp, UnaryOp};
use crate::model::{CallExpression, Expression};
use crate::path;
use crate::value::Literal;
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Tables that can appear as the root of an attribute chain.
pub const TABLE_NAMES: [&str; 10] = [
    "person",
    "family",
    "event",
    "place",
    "source",
    "citation",
    "repository",
    "media",
    "note",
    "tag",
];

pub fn is_table_name(name: &str) -> bool {
    TABLE_NAMES.contains(&name)
}

static INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("index pattern is valid"));

/// Replace every concrete array index with `[]`.
pub fn normalize_indices(path: &str) -> String {
    INDEX.replace_all(path, "[]").into_owned()
}

/// Declared type of a JSON field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

#[derive(Debug, Clone, Default)]
pub struct TypeSchema {
    tables: HashMap<String, HashMap<String, FieldType>>,
}

impl TypeSchema {
    /// A schema that knows no fields; every attribute is untyped.
    pub fn empty() -> Self {
        TypeSchema::default()
    }

    pub fn insert(&mut self, table: &str, path: &str, field_type: FieldType) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(normalize_indices(path), field_type);
    }

    pub fn lookup(&self, table: &str, path: &str) -> Option<FieldType> {
        self.tables
            .get(table)?
            .get(&normalize_indices(path))
            .copied()
    }

    /// Field types of the genealogy record documents.
    pub fn genealogy() -> Self {
        let mut schema = TypeSchema::empty();
        schema.add_person();
        schema.add_family();
        schema.add_event();
        schema.add_place();
        schema.add_source();
        schema.add_citation();
        schema.add_repository();
        schema.add_media();
        schema.add_note();
        schema.add_tag();
        schema
    }

    fn fields(&mut self, table: &str, prefix: &str, fields: &[(&str, FieldType)]) {
        for (name, field_type) in fields {
            self.insert(table, &path::join(prefix, name), *field_type);
        }
    }

    fn name_fields(&mut self, table: &str, prefix: &str) {
        self.fields(table, prefix, NAME);
        self.fields(table, &path::join(prefix, "type"), GRAMPS_TYPE);
        self.fields(table, &path::join(prefix, "date"), DATE);
        let surname = path::join(prefix, "surname_list[]");
        self.fields(table, &surname, SURNAME);
        self.fields(table, &path::join(&surname, "origintype"), GRAMPS_TYPE);
    }

    fn event_refs(&mut self, table: &str) {
        self.fields(table, "event_ref_list[]", EVENT_REF);
        self.fields(table, "event_ref_list[].role", GRAMPS_TYPE);
    }

    fn common(&mut self, table: &str) {
        self.fields(table, "", COMMON);
        for list in ["citation_list[]", "note_list[]", "tag_list[]"] {
            self.insert(table, list, FieldType::String);
        }
    }

    fn add_person(&mut self) {
        let t = "person";
        self.common(t);
        self.fields(t, "", PERSON);
        self.name_fields(t, "primary_name");
        self.name_fields(t, "alternate_names[]");
        self.event_refs(t);
        self.insert(t, "family_list[]", FieldType::String);
        self.insert(t, "parent_family_list[]", FieldType::String);
        self.fields(t, "media_list[]", MEDIA_REF);
        self.fields(t, "address_list[]", ADDRESS);
        self.fields(t, "attribute_list[]", ATTRIBUTE);
        self.fields(t, "attribute_list[].type", GRAMPS_TYPE);
        self.fields(t, "urls[]", URL);
        self.fields(t, "person_ref_list[]", PERSON_REF);
    }

    fn add_family(&mut self) {
        let t = "family";
        self.common(t);
        self.fields(t, "", FAMILY);
        self.fields(t, "type", GRAMPS_TYPE);
        self.fields(t, "child_ref_list[]", CHILD_REF);
        self.fields(t, "child_ref_list[].frel", GRAMPS_TYPE);
        self.fields(t, "child_ref_list[].mrel", GRAMPS_TYPE);
        self.event_refs(t);
        self.fields(t, "media_list[]", MEDIA_REF);
        self.fields(t, "attribute_list[]", ATTRIBUTE);
    }

    fn add_event(&mut self) {
        let t = "event";
        self.common(t);
        self.fields(t, "", EVENT);
        self.fields(t, "type", GRAMPS_TYPE);
        self.fields(t, "date", DATE);
        self.fields(t, "media_list[]", MEDIA_REF);
        self.fields(t, "attribute_list[]", ATTRIBUTE);
    }

    fn add_place(&mut self) {
        let t = "place";
        self.common(t);
        self.fields(t, "", PLACE);
        self.fields(t, "name", PLACE_NAME);
        self.fields(t, "alt_names[]", PLACE_NAME);
        self.fields(t, "place_type", GRAMPS_TYPE);
        self.fields(t, "placeref_list[]", PLACE_REF);
        self.fields(t, "urls[]", URL);
        self.fields(t, "media_list[]", MEDIA_REF);
    }

    fn add_source(&mut self) {
        let t = "source";
        self.common(t);
        self.fields(t, "", SOURCE);
        self.fields(t, "reporef_list[]", REPO_REF);
        self.fields(t, "reporef_list[].media_type", GRAMPS_TYPE);
        self.fields(t, "media_list[]", MEDIA_REF);
        self.fields(t, "attribute_list[]", ATTRIBUTE);
    }

    fn add_citation(&mut self) {
        let t = "citation";
        self.common(t);
        self.fields(t, "", CITATION);
        self.fields(t, "date", DATE);
        self.fields(t, "media_list[]", MEDIA_REF);
        self.fields(t, "attribute_list[]", ATTRIBUTE);
    }

    fn add_repository(&mut self) {
        let t = "repository";
        self.common(t);
        self.fields(t, "", REPOSITORY);
        self.fields(t, "type", GRAMPS_TYPE);
        self.fields(t, "address_list[]", ADDRESS);
        self.fields(t, "urls[]", URL);
    }

    fn add_media(&mut self) {
        let t = "media";
        self.common(t);
        self.fields(t, "", MEDIA);
        self.fields(t, "date", DATE);
        self.fields(t, "attribute_list[]", ATTRIBUTE);
    }

    fn add_note(&mut self) {
        let t = "note";
        self.common(t);
        self.fields(t, "", NOTE);
        self.fields(t, "type", GRAMPS_TYPE);
        self.insert(t, "text.string", FieldType::String);
        self.insert(t, "text.tags", FieldType::Array);
    }

    fn add_tag(&mut self) {
        self.fields("tag", "", TAG);
    }
}

use FieldType::{Array as A, Boolean as B, Number as N, Object as O, String as S};

const COMMON: &[(&str, FieldType)] = &[
    ("handle", S),
    ("gramps_id", S),
    ("change", N),
    ("private", B),
    ("citation_list", A),
    ("note_list", A),
    ("tag_list", A),
];

const GRAMPS_TYPE: &[(&str, FieldType)] = &[("value", N), ("string", S)];

const DATE: &[(&str, FieldType)] = &[
    ("calendar", N),
    ("modifier", N),
    ("quality", N),
    ("dateval", A),
    ("text", S),
    ("sortval", N),
    ("newyear", N),
    ("year", N),
];

const NAME: &[(&str, FieldType)] = &[
    ("first_name", S),
    ("surname_list", A),
    ("suffix", S),
    ("title", S),
    ("call", S),
    ("nick", S),
    ("famnick", S),
    ("group_as", S),
    ("sort_as", N),
    ("display_as", N),
    ("private", B),
    ("type", O),
    ("date", O),
    ("citation_list", A),
    ("note_list", A),
];

const SURNAME: &[(&str, FieldType)] = &[
    ("surname", S),
    ("prefix", S),
    ("primary", B),
    ("connector", S),
    ("origintype", O),
];

const EVENT_REF: &[(&str, FieldType)] = &[
    ("ref", S),
    ("role", O),
    ("private", B),
    ("attribute_list", A),
    ("citation_list", A),
    ("note_list", A),
];

const CHILD_REF: &[(&str, FieldType)] = &[
    ("ref", S),
    ("frel", O),
    ("mrel", O),
    ("private", B),
];

const MEDIA_REF: &[(&str, FieldType)] = &[("ref", S), ("rect", A), ("private", B)];

const ATTRIBUTE: &[(&str, FieldType)] = &[("type", O), ("value", S), ("private", B)];

const ADDRESS: &[(&str, FieldType)] = &[
    ("street", S),
    ("locality", S),
    ("city", S),
    ("county", S),
    ("state", S),
    ("country", S),
    ("postal", S),
    ("phone", S),
    ("private", B),
    ("date", O),
];

const URL: &[(&str, FieldType)] = &[("path", S), ("desc", S), ("type", O), ("private", B)];

const PERSON_REF: &[(&str, FieldType)] = &[("ref", S), ("rel", S), ("private", B)];

const REPO_REF: &[(&str, FieldType)] = &[
    ("ref", S),
    ("call_number", S),
    ("media_type", O),
    ("private", B),
];

const PLACE_REF: &[(&str, FieldType)] = &[("ref", S), ("date", O)];

const PLACE_NAME: &[(&str, FieldType)] = &[("value", S), ("lang", S), ("date", O)];

const PERSON: &[(&str, FieldType)] = &[
    ("gender", N),
    ("primary_name", O),
    ("alternate_names", A),
    ("event_ref_list", A),
    ("family_list", A),
    ("parent_family_list", A),
    ("media_list", A),
    ("address_list", A),
    ("attribute_list", A),
    ("urls", A),
    ("lds_ord_list", A),
    ("person_ref_list", A),
    ("birth_ref_index", N),
    ("death_ref_index", N),
];

const FAMILY: &[(&str, FieldType)] = &[
    ("father_handle", S),
    ("mother_handle", S),
    ("child_ref_list", A),
    ("type", O),
    ("event_ref_list", A),
    ("media_list", A),
    ("attribute_list", A),
    ("lds_ord_list", A),
    ("complete", N),
];

const EVENT: &[(&str, FieldType)] = &[
    ("type", O),
    ("date", O),
    ("description", S),
    ("place", S),
    ("media_list", A),
    ("attribute_list", A),
];

const PLACE: &[(&str, FieldType)] = &[
    ("title", S),
    ("long", S),
    ("lat", S),
    ("code", S),
    ("name", O),
    ("alt_names", A),
    ("place_type", O),
    ("placeref_list", A),
    ("alt_loc", A),
    ("urls", A),
    ("media_list", A),
];

const SOURCE: &[(&str, FieldType)] = &[
    ("title", S),
    ("author", S),
    ("pubinfo", S),
    ("abbrev", S),
    ("reporef_list", A),
    ("media_list", A),
    ("attribute_list", A),
];

const CITATION: &[(&str, FieldType)] = &[
    ("page", S),
    ("confidence", N),
    ("source_handle", S),
    ("date", O),
    ("media_list", A),
    ("attribute_list", A),
];

const REPOSITORY: &[(&str, FieldType)] = &[
    ("name", S),
    ("type", O),
    ("address_list", A),
    ("urls", A),
];

const MEDIA: &[(&str, FieldType)] = &[
    ("path", S),
    ("mime", S),
    ("desc", S),
    ("checksum", S),
    ("date", O),
    ("attribute_list", A),
];

const NOTE: &[(&str, FieldType)] = &[("text", O), ("format", N), ("type", O)];

const TAG: &[(&str, FieldType)] = &[
    ("handle", S),
    ("name", S),
    ("color", S),
    ("priority", N),
    ("change", N),
];

/// Memoised schema lookups for one compilation.
///
/// Owned by a single [`QueryParser`](crate::query_parser::QueryParser) and
/// dropped with it.
pub struct TypeCache<'s> {
    schema: &'s TypeSchema,
    memo: RefCell<HashMap<(String, String), Option<FieldType>>>,
}

impl<'s> TypeCache<'s> {
    pub fn new(schema: &'s TypeSchema) -> Self {
        TypeCache {
            schema,
            memo: RefCell::new(HashMap::new()),
        }
    }

    pub fn lookup(&self, table: &str, path: &str) -> Option<FieldType> {
        let key = (table.to_string(), path.to_string());
        if let Some(hit) = self.memo.borrow().get(&key) {
            return *hit;
        }
        let found = self.schema.lookup(table, path);
        self.memo.borrow_mut().insert(key, found);
        found
    }

    /// Type of a field of the element currently bound to an item variable.
    pub fn lookup_element(&self, table: &str, array_path: &str, path: &str) -> Option<FieldType> {
        self.lookup(table, &path::join(&format!("{}[]", array_path), path))
    }

    pub fn len(&self) -> usize {
        self.memo.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Static type of an expression, where one can be told.
pub fn infer_type(expr: &Expression) -> Option<FieldType> {
    match expr {
        Expression::Constant(literal) => match literal {
            Literal::Null => None,
            Literal::Boolean(_) => Some(FieldType::Boolean),
            Literal::Integer(_) | Literal::Float(_) => Some(FieldType::Number),
            Literal::String(_) => Some(FieldType::String),
        },
        Expression::Attribute(attr) => attr.inferred_type,
        Expression::BinaryOp(op) => {
            match (infer_type(&op.left), infer_type(&op.right)) {
                (Some(FieldType::Number), Some(FieldType::Number)) => Some(FieldType::Number),
                (Some(FieldType::String), Some(FieldType::String)) if op.operator == BinOp::Add => {
                    Some(FieldType::String)
                }
                _ => None,
            }
        }
        Expression::UnaryOp(op) => match op.operator {
            UnaryOp::Not => Some(FieldType::Boolean),
            UnaryOp::Negate => infer_type(&op.operand).filter(|t| *t == FieldType::Number),
        },
        Expression::Compare(_) | Expression::BoolOp(_) | Expression::Any(_) => {
            Some(FieldType::Boolean)
        }
        Expression::Call(call) => infer_call(call),
        Expression::If(branch) => {
            let body = infer_type(&branch.body);
            if body == infer_type(&branch.orelse) { body } else { None }
        }
        Expression::ListComprehension(_) => Some(FieldType::Array),
        Expression::ArrayAccess(_) | Expression::ArrayExpansion(_) | Expression::Tuple(_) => None,
    }
}

fn infer_call(call: &CallExpression) -> Option<FieldType> {
    if call.string_method().is_some() {
        return Some(FieldType::Boolean);
    }
    match call.builtin() {
        Some("len") => Some(FieldType::Number),
        Some("json_array") => Some(FieldType::Array),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_indices() {
        assert_eq!(normalize_indices("event_ref_list[0].ref"), "event_ref_list[].ref");
        assert_eq!(
            normalize_indices("event_ref_list[person.birth_ref_index].role.value"),
            "event_ref_list[].role.value"
        );
        assert_eq!(normalize_indices("gramps_id"), "gramps_id");
    }

    #[test]
    fn test_genealogy_lookups() {
        let schema = TypeSchema::genealogy();
        assert_eq!(schema.lookup("person", "handle"), Some(FieldType::String));
        assert_eq!(schema.lookup("person", "gender"), Some(FieldType::Number));
        assert_eq!(schema.lookup("person", "private"), Some(FieldType::Boolean));
        assert_eq!(
            schema.lookup("person", "primary_name.surname_list[0].surname"),
            Some(FieldType::String)
        );
        assert_eq!(
            schema.lookup("person", "event_ref_list[2].role.value"),
            Some(FieldType::Number)
        );
        assert_eq!(schema.lookup("family", "father_handle"), Some(FieldType::String));
        assert_eq!(schema.lookup("person", "no_such_field"), None);
        assert_eq!(schema.lookup("nowhere", "handle"), None);
    }

    #[test]
    fn test_cache_memoises() {
        let schema = TypeSchema::genealogy();
        let cache = TypeCache::new(&schema);
        assert!(cache.is_empty());
        assert_eq!(cache.lookup("person", "gender"), Some(FieldType::Number));
        assert_eq!(cache.lookup("person", "gender"), Some(FieldType::Number));
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.lookup_element("person", "event_ref_list", "role.value"),
            Some(FieldType::Number)
        );
        assert_eq!(
            cache.lookup_element("person", "family_list", ""),
            Some(FieldType::String)
        );
    }

    #[test]
    fn test_infer_constants() {
        assert_eq!(
            infer_type(&Expression::Constant(Literal::Integer(1))),
            Some(FieldType::Number)
        );
        assert_eq!(infer_type(&Expression::string("x")), Some(FieldType::String));
        assert_eq!(infer_type(&Expression::Constant(Literal::Null)), None);
    }
}
