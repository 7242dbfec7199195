//! Global and per-part-type dimensions.
//!
//! A [`DimensionStore`] is built once per project from a set of
//! [`GlobalDimensions`] and a [`DimensionProvider`]. Construction runs in a
//! fixed order:
//!
//! 1. the global extents and attributes are stored,
//! 2. [`DimensionProvider::derive`] computes provider-specific derived fields,
//! 3. [`DimensionProvider::part_types`] returns the per-part-type records,
//!    which may read the fields derived in step 2.
//!
//! The store is immutable afterwards and is shared read-only by builders and
//! assemblers.

use std::fmt;
use std::ops::Index;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{EntryKind, Error, Result};
use crate::ident::{normalize, CanonicalKey, Declared, Ident, Universe};
use crate::normalized::NormalizedMap;

const STORE: &str = "DimensionStore";

/// A named attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Boolean flag.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// Free text.
    Text(String),
}

impl AttrValue {
    /// Numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean value, if this is a flag.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(v) => write!(f, "{v}"),
            AttrValue::Number(v) => write!(f, "{v}"),
            AttrValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Number(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Number(f64::from(v))
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

impl From<&AttrValue> for serde_json::Value {
    fn from(v: &AttrValue) -> Self {
        match v {
            AttrValue::Bool(b) => serde_json::Value::Bool(*b),
            AttrValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            AttrValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// Named attributes keyed by canonical attribute name.
pub type Attributes = NormalizedMap<AttrValue>;

/// Extents along X, Y and Z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extents {
    /// Length along X.
    pub x_len: f64,
    /// Length along Y.
    pub y_len: f64,
    /// Length along Z.
    pub z_len: f64,
}

impl Extents {
    /// Create extents.
    pub fn new(x_len: f64, y_len: f64, z_len: f64) -> Self {
        Self {
            x_len,
            y_len,
            z_len,
        }
    }

    /// Extents as a vector.
    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x_len, self.y_len, self.z_len)
    }

    fn validate(&self, part_type: &str) -> Result<()> {
        for (axis, v) in [("x", self.x_len), ("y", self.y_len), ("z", self.z_len)] {
            if !v.is_finite() || v < 0.0 {
                return Err(Error::DimensionShape {
                    part_type: part_type.to_string(),
                    reason: format!("{axis} extent must be a finite non-negative number, got {v}"),
                });
            }
        }
        Ok(())
    }
}

impl From<(f64, f64, f64)> for Extents {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self::new(x, y, z)
    }
}

impl From<[f64; 3]> for Extents {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::new(x, y, z)
    }
}

/// Project-wide dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalDimensions {
    /// Overall extents.
    #[serde(flatten)]
    pub extents: Extents,
    /// Global named attributes (e.g. `mat_thickness`).
    #[serde(default)]
    pub attributes: Attributes,
    /// Attribute tables keyed by attribute name, then part type.
    #[serde(default)]
    pub part_type_attributes: NormalizedMap<NormalizedMap<AttrValue>>,
}

impl GlobalDimensions {
    /// Create global dimensions without attributes.
    pub fn new(x_len: f64, y_len: f64, z_len: f64) -> Self {
        Self {
            extents: Extents::new(x_len, y_len, z_len),
            attributes: Attributes::new(),
            part_type_attributes: NormalizedMap::new(),
        }
    }

    /// Add a global attribute.
    pub fn with_attribute(mut self, name: impl Ident, value: impl Into<AttrValue>) -> Result<Self> {
        self.attributes.insert(name, value.into())?;
        Ok(self)
    }

    /// Add an attribute table with one value per part type.
    pub fn with_part_type_attribute<K: Ident, V: Into<AttrValue>>(
        mut self,
        name: impl Ident,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self> {
        let table = self
            .part_type_attributes
            .get_or_insert_with(name, NormalizedMap::new)?;
        for (part_type, value) in values {
            table.insert(part_type, value.into())?;
        }
        Ok(self)
    }

    /// Length along X.
    pub fn x_len(&self) -> f64 {
        self.extents.x_len
    }

    /// Length along Y.
    pub fn y_len(&self) -> f64 {
        self.extents.y_len
    }

    /// Length along Z.
    pub fn z_len(&self) -> f64 {
        self.extents.z_len
    }

    /// Global attribute by name.
    pub fn attribute(&self, name: impl Ident) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    /// Numeric global attribute.
    pub fn number(&self, name: impl Ident) -> Result<f64> {
        let text = name.ident_text().into_owned();
        self.attribute(&text)
            .and_then(AttrValue::as_f64)
            .ok_or(Error::Attribute {
                owner: "global dimensions".to_string(),
                name: text,
            })
    }

    /// Value of attribute `name` for `part_type` from the attribute tables.
    pub fn part_type_attribute(&self, part_type: impl Ident, name: impl Ident) -> Option<&AttrValue> {
        self.part_type_attributes.get(name)?.get(part_type)
    }

    /// Numeric value of attribute `name` for `part_type`, falling back to the
    /// global attribute of the same name.
    pub fn part_type_number(&self, part_type: impl Ident, name: impl Ident) -> Result<f64> {
        let name = name.ident_text().into_owned();
        self.part_type_attribute(&part_type, &name)
            .or_else(|| self.attribute(&name))
            .and_then(AttrValue::as_f64)
            .ok_or_else(|| Error::Attribute {
                owner: format!("part type '{}'", part_type.ident_text()),
                name,
            })
    }
}

/// Dimensions for one part type as returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub enum RawDimensions {
    /// Extents only.
    Extents(Extents),
    /// Extents plus named attributes.
    WithAttributes(Extents, Attributes),
    /// Unchecked data, e.g. from configuration: `[x, y, z]`,
    /// `[[x, y, z], {attributes}]` or `{"extents": [..], "attributes": {..}}`.
    Untyped(serde_json::Value),
}

impl From<Extents> for RawDimensions {
    fn from(extents: Extents) -> Self {
        RawDimensions::Extents(extents)
    }
}

impl From<(f64, f64, f64)> for RawDimensions {
    fn from(extents: (f64, f64, f64)) -> Self {
        RawDimensions::Extents(extents.into())
    }
}

impl From<[f64; 3]> for RawDimensions {
    fn from(extents: [f64; 3]) -> Self {
        RawDimensions::Extents(extents.into())
    }
}

impl From<((f64, f64, f64), Attributes)> for RawDimensions {
    fn from((extents, attributes): ((f64, f64, f64), Attributes)) -> Self {
        RawDimensions::WithAttributes(extents.into(), attributes)
    }
}

impl From<Vec<f64>> for RawDimensions {
    fn from(values: Vec<f64>) -> Self {
        RawDimensions::Untyped(serde_json::Value::from(values))
    }
}

impl From<serde_json::Value> for RawDimensions {
    fn from(value: serde_json::Value) -> Self {
        RawDimensions::Untyped(value)
    }
}

fn shape_error(part_type: &str, reason: impl Into<String>) -> Error {
    Error::DimensionShape {
        part_type: part_type.to_string(),
        reason: reason.into(),
    }
}

fn untyped_extents(part_type: &str, value: &serde_json::Value) -> Result<Extents> {
    let items = value
        .as_array()
        .ok_or_else(|| shape_error(part_type, format!("expected an array of 3 extents, got {value}")))?;
    if items.len() != 3 {
        return Err(shape_error(
            part_type,
            format!("expected 3 extents, got {}", items.len()),
        ));
    }
    let mut out = [0.0; 3];
    for (i, item) in items.iter().enumerate() {
        out[i] = item
            .as_f64()
            .ok_or_else(|| shape_error(part_type, format!("extent {i} is not a number: {item}")))?;
    }
    Ok(out.into())
}

fn untyped_attributes(part_type: &str, value: &serde_json::Value) -> Result<Attributes> {
    let object = value
        .as_object()
        .ok_or_else(|| shape_error(part_type, format!("expected an attribute mapping, got {value}")))?;
    let mut attributes = Attributes::new();
    for (name, v) in object {
        let attr = match v {
            serde_json::Value::Bool(b) => AttrValue::Bool(*b),
            serde_json::Value::Number(n) => AttrValue::Number(
                n.as_f64()
                    .ok_or_else(|| shape_error(part_type, format!("attribute '{name}' out of range")))?,
            ),
            serde_json::Value::String(s) => AttrValue::Text(s.clone()),
            other => {
                return Err(shape_error(
                    part_type,
                    format!("attribute '{name}' has unsupported value {other}"),
                ))
            }
        };
        attributes.insert(name.as_str(), attr)?;
    }
    Ok(attributes)
}

impl RawDimensions {
    /// Validate and split into extents and attributes.
    pub fn into_parts(self, part_type: &str) -> Result<(Extents, Attributes)> {
        let (extents, attributes) = match self {
            RawDimensions::Extents(extents) => (extents, Attributes::new()),
            RawDimensions::WithAttributes(extents, attributes) => (extents, attributes),
            RawDimensions::Untyped(value) => match &value {
                serde_json::Value::Array(items) if items.len() == 2 && items[0].is_array() => (
                    untyped_extents(part_type, &items[0])?,
                    untyped_attributes(part_type, &items[1])?,
                ),
                serde_json::Value::Object(object) => {
                    let extents = object
                        .get("extents")
                        .ok_or_else(|| shape_error(part_type, "missing 'extents'"))?;
                    let attributes = match object.get("attributes") {
                        Some(attrs) => untyped_attributes(part_type, attrs)?,
                        None => Attributes::new(),
                    };
                    (untyped_extents(part_type, extents)?, attributes)
                }
                _ => (untyped_extents(part_type, &value)?, Attributes::new()),
            },
        };
        extents.validate(part_type)?;
        Ok((extents, attributes))
    }
}

/// Per-part-type dimensions returned by a [`DimensionProvider`].
#[derive(Debug, Clone, Default)]
pub struct PartTypeTable {
    entries: Vec<(Declared, RawDimensions)>,
}

impl PartTypeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add dimensions for a part type.
    pub fn insert(&mut self, part_type: impl Ident, dims: impl Into<RawDimensions>) -> Result<()> {
        self.entries.push((Declared::new(part_type)?, dims.into()));
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, part_type: impl Ident, dims: impl Into<RawDimensions>) -> Result<Self> {
        self.insert(part_type, dims)?;
        Ok(self)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Supplies per-part-type dimensions for a [`DimensionStore`].
///
/// Implementors typically carry derived global fields of their own (a routing
/// depth, per-part material thickness) and compute them in [`derive`].
///
/// [`derive`]: DimensionProvider::derive
pub trait DimensionProvider {
    /// Compute derived fields once the global dimensions are set.
    fn derive(&mut self, _globals: &GlobalDimensions) -> Result<()> {
        Ok(())
    }

    /// Return the dimensions of every part type.
    fn part_types(&self, globals: &GlobalDimensions) -> Result<PartTypeTable>;
}

impl DimensionProvider for () {
    fn part_types(&self, _globals: &GlobalDimensions) -> Result<PartTypeTable> {
        Ok(PartTypeTable::new())
    }
}

impl DimensionProvider for PartTypeTable {
    fn part_types(&self, _globals: &GlobalDimensions) -> Result<PartTypeTable> {
        Ok(self.clone())
    }
}

/// Flattened dimensions of one part type.
#[derive(Debug, Clone, PartialEq)]
pub struct PartTypeDimensions {
    part_type: CanonicalKey,
    /// Length along X.
    pub x_len: f64,
    /// Length along Y.
    pub y_len: f64,
    /// Length along Z.
    pub z_len: f64,
    attributes: Attributes,
}

impl PartTypeDimensions {
    /// Part type these dimensions belong to.
    pub fn part_type(&self) -> &CanonicalKey {
        &self.part_type
    }

    /// Extents as a struct.
    pub fn extents(&self) -> Extents {
        Extents::new(self.x_len, self.y_len, self.z_len)
    }

    /// Named attributes.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Attribute by name.
    pub fn attr(&self, name: impl Ident) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    /// Numeric attribute by name.
    pub fn number(&self, name: impl Ident) -> Result<f64> {
        let text = name.ident_text().into_owned();
        self.attr(&text)
            .and_then(AttrValue::as_f64)
            .ok_or_else(|| Error::Attribute {
                owner: format!("part type '{}'", self.part_type),
                name: text,
            })
    }
}

/// Immutable store of global and per-part-type dimensions.
#[derive(Debug, Clone)]
pub struct DimensionStore<P = ()> {
    globals: GlobalDimensions,
    provider: P,
    records: NormalizedMap<PartTypeDimensions>,
}

impl<P: DimensionProvider> DimensionStore<P> {
    /// Build the store: store globals, derive provider fields, then flatten
    /// the provider's per-part-type dimensions.
    pub fn new(globals: GlobalDimensions, mut provider: P) -> Result<Self> {
        globals.extents.validate("<global>")?;
        provider.derive(&globals)?;
        let table = provider.part_types(&globals)?;

        let owner = std::any::type_name::<P>();
        let mut seen = Universe::new(EntryKind::PartType);
        let mut records = NormalizedMap::new();
        for (declared, raw) in table.entries {
            seen.insert_declared(owner, declared.clone(), Default::default())?;
            let key = declared.key().clone();
            let (extents, own_attributes) = raw.into_parts(key.as_str())?;

            let mut attributes = Attributes::new();
            for (name, per_part_type) in &globals.part_type_attributes {
                if let Some(value) = per_part_type.get(&key) {
                    attributes.insert(name, value.clone())?;
                }
            }
            for (name, value) in own_attributes {
                attributes.insert(name, value)?;
            }

            records.insert(
                &key,
                PartTypeDimensions {
                    part_type: key.clone(),
                    x_len: extents.x_len,
                    y_len: extents.y_len,
                    z_len: extents.z_len,
                    attributes,
                },
            )?;
        }

        tracing::debug!(part_types = records.len(), "dimension store built");
        Ok(Self {
            globals,
            provider,
            records,
        })
    }
}

impl DimensionStore<()> {
    /// A store with global dimensions only.
    pub fn basic(globals: GlobalDimensions) -> Result<Self> {
        Self::new(globals, ())
    }
}

impl<P> DimensionStore<P> {
    /// Global dimensions.
    pub fn globals(&self) -> &GlobalDimensions {
        &self.globals
    }

    /// The provider, including any fields it derived.
    pub fn ext(&self) -> &P {
        &self.provider
    }

    /// Global length along X.
    pub fn x_len(&self) -> f64 {
        self.globals.x_len()
    }

    /// Global length along Y.
    pub fn y_len(&self) -> f64 {
        self.globals.y_len()
    }

    /// Global length along Z.
    pub fn z_len(&self) -> f64 {
        self.globals.z_len()
    }

    /// Global attribute by name.
    pub fn attribute(&self, name: impl Ident) -> Option<&AttrValue> {
        self.globals.attribute(name)
    }

    /// Dimensions of a part type.
    pub fn get(&self, part_type: impl Ident) -> Result<&PartTypeDimensions> {
        let key = normalize(&part_type)?;
        self.records.get(&key).ok_or_else(|| Error::UnknownPartType {
            owner: STORE.to_string(),
            key,
            requested: part_type.ident_text().into_owned(),
        })
    }

    /// Check if a part type has dimensions.
    pub fn contains(&self, part_type: impl Ident) -> bool {
        self.records.contains_key(part_type)
    }

    /// Part types with dimensions, in provider order.
    pub fn part_types(&self) -> impl Iterator<Item = &CanonicalKey> {
        self.records.keys()
    }

    /// Attribute of a part type, falling back to the global attribute of the
    /// same name.
    pub fn attribute_for(&self, part_type: impl Ident, name: impl Ident) -> Option<&AttrValue> {
        let name = name.ident_text().into_owned();
        self.records
            .get(part_type)
            .and_then(|r| r.attr(&name))
            .or_else(|| self.globals.attribute(&name))
    }

    /// Numeric form of [`attribute_for`](Self::attribute_for).
    pub fn number_for(&self, part_type: impl Ident, name: impl Ident) -> Result<f64> {
        let part_type = part_type.ident_text().into_owned();
        let name = name.ident_text().into_owned();
        self.attribute_for(&part_type, &name)
            .and_then(AttrValue::as_f64)
            .ok_or(Error::Attribute {
                owner: format!("part type '{part_type}'"),
                name,
            })
    }
}

impl<P, I: Ident> Index<I> for DimensionStore<P> {
    type Output = PartTypeDimensions;

    /// # Panics
    ///
    /// Panics if the part type has no dimensions; use
    /// [`DimensionStore::get`] for a fallible lookup.
    fn index(&self, part_type: I) -> &PartTypeDimensions {
        match self.get(part_type) {
            Ok(record) => record,
            Err(e) => panic!("{e}"),
        }
    }
}
