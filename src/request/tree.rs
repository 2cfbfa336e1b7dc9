//! Record trees for the composite tree resource.

// crates.io
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

/// One record plus its nested child records, inserted together by the tree resource.
#[derive(Clone, Debug, PartialEq)]
pub struct SObjectTree {
	/// Object type of the record, for example `Account`.
	pub object_type: String,
	/// Child relationship name used when this record is nested, for example `Contacts`.
	pub object_type_plural: String,
	/// Caller-chosen reference id echoed back in the response.
	pub reference_id: String,
	/// Field values of the record.
	pub fields: Map<String, Value>,
	/// Nested child records.
	pub children: Vec<SObjectTree>,
}
impl SObjectTree {
	/// Creates a record node without children.
	pub fn new(
		object_type: impl Into<String>,
		object_type_plural: impl Into<String>,
		reference_id: impl Into<String>,
		fields: Map<String, Value>,
	) -> Self {
		Self {
			object_type: object_type.into(),
			object_type_plural: object_type_plural.into(),
			reference_id: reference_id.into(),
			fields,
			children: Vec::new(),
		}
	}

	/// Appends a child record.
	pub fn with_child(mut self, child: SObjectTree) -> Self {
		self.children.push(child);

		self
	}

	/// Renders the node in the wire layout:
	/// `{"attributes": {...}, <fields>, <plural>: {"records": [...]}}`.
	pub fn to_json(&self) -> Value {
		let mut record = Map::new();

		record.insert(
			"attributes".into(),
			serde_json::json!({ "type": self.object_type, "referenceId": self.reference_id }),
		);

		for (name, value) in &self.fields {
			record.insert(name.clone(), value.clone());
		}

		let mut groups: BTreeMap<&str, Vec<Value>> = BTreeMap::new();

		for child in &self.children {
			groups.entry(child.object_type_plural.as_str()).or_default().push(child.to_json());
		}
		for (plural, records) in groups {
			record.insert(plural.to_owned(), serde_json::json!({ "records": records }));
		}

		Value::Object(record)
	}

	/// Returns every reference id in this subtree, depth first.
	pub fn reference_ids(&self) -> Vec<&str> {
		let mut ids = vec![self.reference_id.as_str()];

		for child in &self.children {
			ids.extend(child.reference_ids());
		}

		ids
	}
}
