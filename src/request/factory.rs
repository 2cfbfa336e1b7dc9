//! Builders for the standard REST resources.
//!
//! Every builder is pure: it validates its parameters, renders the path for the configured
//! API version, and returns a [`RestRequest`] without touching the network or the session.

// crates.io
use serde_json::{Map, Value, json};
// self
use crate::{
	_prelude::*,
	config::{DEFAULT_API_VERSION, DEFAULT_ENDPOINT, IF_UNMODIFIED_SINCE},
	error::ValidationError,
	http::HttpMethod,
	request::{RequestBody, RestRequest, http_date, tree::SObjectTree},
};

/// Maximum number of subrequests accepted by the batch and composite resources.
pub const MAX_SUBREQUESTS: usize = 25;

const USER_INFO_ENDPOINT: &str = "/services/oauth2";
const LAYOUT_TYPES: [&str; 2] = ["Full", "Compact"];

/// Builds [`RestRequest`] values for one API version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFactory {
	/// API version rendered into every versioned path, for example `v42.0`.
	pub api_version: String,
	/// Endpoint prefix attached to every built request.
	pub endpoint: String,
}
impl RequestFactory {
	/// Creates a factory for the provided API version and the standard endpoint.
	pub fn new(api_version: impl Into<String>) -> Self {
		Self { api_version: api_version.into(), endpoint: DEFAULT_ENDPOINT.into() }
	}

	/// Overrides the endpoint prefix.
	pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.endpoint = endpoint.into();

		self
	}

	/// Information about the authenticated user.
	pub fn user_info(&self) -> RestRequest {
		self.request(HttpMethod::Get, "/userinfo").with_endpoint(USER_INFO_ENDPOINT)
	}

	/// Summary of every API version available on the instance.
	pub fn versions(&self) -> RestRequest {
		self.request(HttpMethod::Get, "/")
	}

	/// Resources available for the configured API version.
	pub fn resources(&self) -> RestRequest {
		self.versioned(HttpMethod::Get, "/")
	}

	/// Object types available to the user.
	pub fn describe_global(&self) -> RestRequest {
		self.versioned(HttpMethod::Get, "/sobjects/")
	}

	/// Basic metadata of an object type.
	pub fn metadata(&self, object_type: &str) -> Result<RestRequest, ValidationError> {
		let object_type = segment("object_type", object_type)?;

		Ok(self.versioned(HttpMethod::Get, &format!("/sobjects/{object_type}/")))
	}

	/// Full description of an object type (fields, URLs, child relationships).
	pub fn describe(&self, object_type: &str) -> Result<RestRequest, ValidationError> {
		let object_type = segment("object_type", object_type)?;

		Ok(self.versioned(HttpMethod::Get, &format!("/sobjects/{object_type}/describe/")))
	}

	/// Record layout of an object type; `layout_type` is `Full` (default) or `Compact`.
	pub fn layout(
		&self,
		object_type: &str,
		layout_type: Option<&str>,
	) -> Result<RestRequest, ValidationError> {
		let object_type = segment("object_type", object_type)?;
		let layout_type = layout_type.map(str::trim).unwrap_or(LAYOUT_TYPES[0]);

		if !LAYOUT_TYPES.contains(&layout_type) {
			return Err(ValidationError::InvalidParameter {
				parameter: "layout_type",
				reason: format!("expected one of {LAYOUT_TYPES:?}, got `{layout_type}`"),
			});
		}

		Ok(self
			.versioned(HttpMethod::Get, &format!("/ui-api/layout/{object_type}"))
			.with_query("layoutType", layout_type))
	}

	/// Field values of one record; `field_list` is a comma-separated list, `None` for all fields.
	pub fn retrieve(
		&self,
		object_type: &str,
		object_id: &str,
		field_list: Option<&str>,
	) -> Result<RestRequest, ValidationError> {
		let object_type = segment("object_type", object_type)?;
		let object_id = segment("object_id", object_id)?;
		let mut request =
			self.versioned(HttpMethod::Get, &format!("/sobjects/{object_type}/{object_id}"));

		if let Some(fields) = field_list.map(str::trim).filter(|fields| !fields.is_empty()) {
			request = request.with_query("fields", fields);
		}

		Ok(request)
	}

	/// Creates a record.
	pub fn create(
		&self,
		object_type: &str,
		fields: Map<String, Value>,
	) -> Result<RestRequest, ValidationError> {
		let object_type = segment("object_type", object_type)?;

		Ok(self
			.versioned(HttpMethod::Post, &format!("/sobjects/{object_type}/"))
			.with_json(Value::Object(fields)))
	}

	/// Creates or updates a record matched by an external id.
	///
	/// With `external_id` set the record is upserted (`PATCH`); with `None` a new record is
	/// created through the external id field (`POST`). An empty external id is contradictory and
	/// rejected.
	pub fn upsert(
		&self,
		object_type: &str,
		external_id_field: &str,
		external_id: Option<&str>,
		fields: Map<String, Value>,
	) -> Result<RestRequest, ValidationError> {
		let object_type = segment("object_type", object_type)?;
		let field = segment("external_id_field", external_id_field)?;
		let request = match external_id {
			Some(id) if id.trim().is_empty() =>
				return Err(ValidationError::InvalidParameter {
					parameter: "external_id",
					reason: "upsert requires a non-empty external id when one is supplied".into(),
				}),
			Some(id) => self.versioned(
				HttpMethod::Patch,
				&format!("/sobjects/{object_type}/{field}/{}", encode_segment(id.trim())),
			),
			None => self.versioned(HttpMethod::Post, &format!("/sobjects/{object_type}/{field}/")),
		};

		Ok(request.with_json(Value::Object(fields)))
	}

	/// Updates field values of a record, optionally only if it is unmodified since an instant
	/// (the server then answers 412 when the record changed).
	pub fn update(
		&self,
		object_type: &str,
		object_id: &str,
		fields: Map<String, Value>,
		if_unmodified_since: Option<OffsetDateTime>,
	) -> Result<RestRequest, ValidationError> {
		let object_type = segment("object_type", object_type)?;
		let object_id = segment("object_id", object_id)?;
		let mut request = self
			.versioned(HttpMethod::Patch, &format!("/sobjects/{object_type}/{object_id}"))
			.with_json(Value::Object(fields));

		if let Some(instant) = if_unmodified_since {
			request = request.with_if_unmodified_since(instant);
		}

		Ok(request)
	}

	/// Deletes a record.
	pub fn delete(&self, object_type: &str, object_id: &str) -> Result<RestRequest, ValidationError> {
		let object_type = segment("object_type", object_type)?;
		let object_id = segment("object_id", object_id)?;

		Ok(self.versioned(HttpMethod::Delete, &format!("/sobjects/{object_type}/{object_id}")))
	}

	/// Executes a SOQL query.
	pub fn query(&self, soql: &str) -> Result<RestRequest, ValidationError> {
		let soql = required("soql", soql)?;

		Ok(self.versioned(HttpMethod::Get, "/query").with_query("q", soql))
	}

	/// Executes a SOQL query that also returns deleted and archived records.
	pub fn query_all(&self, soql: &str) -> Result<RestRequest, ValidationError> {
		let soql = required("soql", soql)?;

		Ok(self.versioned(HttpMethod::Get, "/queryAll").with_query("q", soql))
	}

	/// Executes a SOSL search.
	pub fn search(&self, sosl: &str) -> Result<RestRequest, ValidationError> {
		let sosl = required("sosl", sosl)?;

		Ok(self.versioned(HttpMethod::Get, "/search").with_query("q", sosl))
	}

	/// Ordered list of objects in the user's default global search scope.
	pub fn search_scope_and_order(&self) -> RestRequest {
		self.versioned(HttpMethod::Get, "/search/scopeOrder")
	}

	/// Search result layouts for a comma-separated list of objects.
	pub fn search_result_layout(&self, object_list: &str) -> Result<RestRequest, ValidationError> {
		let object_list = required("object_list", object_list)?;

		Ok(self.versioned(HttpMethod::Get, "/search/layout").with_query("q", object_list))
	}

	/// Executes up to [`MAX_SUBREQUESTS`] independent subrequests in one call.
	///
	/// The batch resource accepts no per-subrequest headers, so caller headers and
	/// conditional-update timestamps of the subrequests are not forwarded; use
	/// [`RequestFactory::composite`] when they matter.
	pub fn batch(
		&self,
		requests: &[RestRequest],
		halt_on_error: bool,
	) -> Result<RestRequest, ValidationError> {
		check_subrequest_count(requests)?;

		let batch_requests: Vec<Value> = requests
			.iter()
			.map(|request| {
				let relative = request.relative_url();
				let endpoint = request.endpoint.trim_end_matches('/');
				let url = relative.strip_prefix(endpoint).unwrap_or(&relative).trim_start_matches('/');
				let mut entry = json!({ "method": request.method.as_str(), "url": url });

				if let Some(body) = json_body(request) {
					entry["richInput"] = body;
				}

				entry
			})
			.collect();

		Ok(self
			.versioned(HttpMethod::Post, "/composite/batch")
			.with_json(json!({ "haltOnError": halt_on_error, "batchRequests": batch_requests })))
	}

	/// Executes up to [`MAX_SUBREQUESTS`] subrequests that may reference each other's results
	/// through `ref_ids` (one per subrequest, unique, non-empty).
	pub fn composite(
		&self,
		requests: &[RestRequest],
		ref_ids: &[&str],
		all_or_none: bool,
	) -> Result<RestRequest, ValidationError> {
		check_subrequest_count(requests)?;

		if ref_ids.len() != requests.len() {
			return Err(ValidationError::LengthMismatch {
				parameter: "ref_ids",
				expected: requests.len(),
				actual: ref_ids.len(),
			});
		}

		let mut seen = Vec::with_capacity(ref_ids.len());

		for ref_id in ref_ids {
			let ref_id = required("ref_ids", ref_id)?;

			if seen.contains(&ref_id) {
				return Err(ValidationError::InvalidParameter {
					parameter: "ref_ids",
					reason: format!("reference id `{ref_id}` is used more than once"),
				});
			}

			seen.push(ref_id);
		}

		let composite_requests = requests
			.iter()
			.zip(seen)
			.map(|(request, ref_id)| {
				let mut entry = json!({
					"method": request.method.as_str(),
					"url": request.relative_url(),
					"referenceId": ref_id,
				});

				if let Some(body) = json_body(request) {
					entry["body"] = body;
				}
				if let Some(headers) = subrequest_headers(request)? {
					entry["httpHeaders"] = headers;
				}

				Ok(entry)
			})
			.collect::<Result<Vec<Value>, ValidationError>>()?;

		Ok(self.versioned(HttpMethod::Post, "/composite").with_json(
			json!({ "allOrNone": all_or_none, "compositeRequest": composite_requests }),
		))
	}

	/// Creates one or more record trees of `object_type` with their nested children.
	pub fn sobject_tree(
		&self,
		object_type: &str,
		trees: &[SObjectTree],
	) -> Result<RestRequest, ValidationError> {
		let object_type = segment("object_type", object_type)?;

		if trees.is_empty() {
			return Err(ValidationError::EmptyParameter { parameter: "object_trees" });
		}

		let records: Vec<Value> = trees.iter().map(SObjectTree::to_json).collect();

		Ok(self
			.versioned(HttpMethod::Post, &format!("/composite/tree/{object_type}"))
			.with_json(json!({ "records": records })))
	}

	fn request(&self, method: HttpMethod, path: &str) -> RestRequest {
		RestRequest::new(method, path)
			.with_endpoint(self.endpoint.clone())
			.with_api_version(self.api_version.clone())
	}

	fn versioned(&self, method: HttpMethod, path: &str) -> RestRequest {
		self.request(method, &format!("/{}{path}", self.api_version))
	}
}
impl Default for RequestFactory {
	fn default() -> Self {
		Self::new(DEFAULT_API_VERSION)
	}
}

fn required<'a>(parameter: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
	let trimmed = value.trim();

	if trimmed.is_empty() {
		Err(ValidationError::EmptyParameter { parameter })
	} else {
		Ok(trimmed)
	}
}

fn segment(parameter: &'static str, value: &str) -> Result<String, ValidationError> {
	required(parameter, value).map(encode_segment)
}

fn check_subrequest_count(requests: &[RestRequest]) -> Result<(), ValidationError> {
	if requests.is_empty() {
		return Err(ValidationError::EmptyParameter { parameter: "requests" });
	}
	if requests.len() > MAX_SUBREQUESTS {
		return Err(ValidationError::InvalidParameter {
			parameter: "requests",
			reason: format!("at most {MAX_SUBREQUESTS} subrequests are allowed, got {}", requests.len()),
		});
	}

	Ok(())
}

/// Caller headers plus `If-Unmodified-Since`, as a composite subrequest `httpHeaders` object.
fn subrequest_headers(request: &RestRequest) -> Result<Option<Value>, ValidationError> {
	let mut headers: Map<String, Value> = request
		.headers
		.iter()
		.map(|(name, value)| (name.clone(), Value::String(value.clone())))
		.collect();

	if let Some(instant) = request.if_unmodified_since {
		let date = http_date(instant).map_err(|err| ValidationError::InvalidParameter {
			parameter: "if_unmodified_since",
			reason: err.to_string(),
		})?;

		headers.retain(|name, _| !name.eq_ignore_ascii_case(IF_UNMODIFIED_SINCE));
		headers.insert(IF_UNMODIFIED_SINCE.into(), Value::String(date));
	}

	Ok(if headers.is_empty() { None } else { Some(Value::Object(headers)) })
}

fn json_body(request: &RestRequest) -> Option<Value> {
	match &request.body {
		Some(RequestBody::Json(value)) => Some(value.clone()),
		_ => None,
	}
}

/// Percent-encodes a path segment, keeping RFC 3986 unreserved characters.
fn encode_segment(value: &str) -> String {
	let mut out = String::with_capacity(value.len());

	for byte in value.bytes() {
		if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
			out.push(char::from(byte));
		} else {
			out.push_str(&format!("%{byte:02X}"));
		}
	}

	out
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn factory() -> RequestFactory {
		RequestFactory::default()
	}

	fn fields(value: Value) -> Map<String, Value> {
		match value {
			Value::Object(map) => map,
			_ => Map::new(),
		}
	}

	#[test]
	fn retrieve_renders_versioned_path_and_field_list() {
		let request = factory()
			.retrieve("Account", "001xx", Some("Name,Industry"))
			.expect("Retrieve should build.");

		assert_eq!(request.method, HttpMethod::Get);
		assert_eq!(request.resolved_path(), "/services/data/v42.0/sobjects/Account/001xx");
		assert_eq!(request.query, vec![("fields".to_owned(), "Name,Industry".to_owned())]);

		let all = factory().retrieve("Account", "001xx", None).expect("Retrieve should build.");

		assert!(all.query.is_empty());
	}

	#[test]
	fn required_strings_are_validated() {
		assert_eq!(
			factory().query("  ").unwrap_err(),
			ValidationError::EmptyParameter { parameter: "soql" }
		);
		assert_eq!(
			factory().describe("").unwrap_err(),
			ValidationError::EmptyParameter { parameter: "object_type" }
		);
		assert!(factory().delete("Account", "").is_err());
		assert!(factory().search_result_layout("").is_err());
	}

	#[test]
	fn composite_rejects_mismatched_reference_ids() {
		let requests = vec![
			factory().describe("Account").expect("Describe should build."),
			factory().describe("Contact").expect("Describe should build."),
			factory().describe("Lead").expect("Describe should build."),
		];
		let err = factory()
			.composite(&requests, &["a", "b"], true)
			.expect_err("Mismatched reference ids must be rejected.");

		assert_eq!(err, ValidationError::LengthMismatch { parameter: "ref_ids", expected: 3, actual: 2 });
		assert!(factory().composite(&requests, &["a", "b", "a"], true).is_err());
	}

	#[test]
	fn composite_forwards_subrequest_headers() {
		let update = factory()
			.update(
				"Account",
				"001xx",
				fields(json!({ "Name": "Acme" })),
				Some(time::macros::datetime!(2024-03-05 06:09:10 UTC)),
			)
			.expect("Update should build.")
			.with_header("Sforce-Auto-Assign", "FALSE");
		let describe = factory().describe("Account").expect("Describe should build.");
		let composite = factory()
			.composite(&[update, describe], &["update", "describe"], true)
			.expect("Composite should build.");
		let Some(RequestBody::Json(body)) = composite.body else {
			panic!("Composite body should be JSON.");
		};
		let headers = &body["compositeRequest"][0]["httpHeaders"];

		assert_eq!(headers["If-Unmodified-Since"], "Tue, 05 Mar 2024 06:09:10 GMT");
		assert_eq!(headers["Sforce-Auto-Assign"], "FALSE");
		assert!(body["compositeRequest"][1].get("httpHeaders").is_none());
	}

	#[test]
	fn composite_body_references_full_paths() {
		let create = factory()
			.create("Account", fields(json!({ "Name": "Acme" })))
			.expect("Create should build.");
		let query = factory().query("SELECT Id FROM Account").expect("Query should build.");
		let composite = factory()
			.composite(&[create, query], &["newAccount", "accounts"], false)
			.expect("Composite should build.");
		let Some(RequestBody::Json(ref body)) = composite.body else {
			panic!("Composite body should be JSON.");
		};

		assert_eq!(composite.resolved_path(), "/services/data/v42.0/composite");
		assert_eq!(body["allOrNone"], false);
		assert_eq!(body["compositeRequest"][0]["url"], "/services/data/v42.0/sobjects/Account/");
		assert_eq!(body["compositeRequest"][0]["body"]["Name"], "Acme");
		assert_eq!(
			body["compositeRequest"][1]["url"],
			"/services/data/v42.0/query?q=SELECT+Id+FROM+Account"
		);
		assert_eq!(body["compositeRequest"][1]["referenceId"], "accounts");
	}

	#[test]
	fn batch_body_uses_version_relative_urls() {
		let describe = factory().describe("Account").expect("Describe should build.");
		let batch = factory().batch(&[describe], true).expect("Batch should build.");
		let Some(RequestBody::Json(body)) = batch.body else {
			panic!("Batch body should be JSON.");
		};

		assert_eq!(body["haltOnError"], true);
		assert_eq!(body["batchRequests"][0]["url"], "v42.0/sobjects/Account/describe/");
		assert!(factory().batch(&[], true).is_err());

		let many = vec![factory().versions(); MAX_SUBREQUESTS + 1];

		assert!(factory().batch(&many, false).is_err());
	}

	#[test]
	fn upsert_distinguishes_missing_and_empty_external_ids() {
		let patch = factory()
			.upsert("Account", "accountMaster__c", Some("AM-1"), Map::new())
			.expect("Upsert should build.");

		assert_eq!(patch.method, HttpMethod::Patch);
		assert_eq!(patch.path, "/v42.0/sobjects/Account/accountMaster__c/AM-1");

		let post = factory()
			.upsert("Account", "accountMaster__c", None, Map::new())
			.expect("Upsert without id should build.");

		assert_eq!(post.method, HttpMethod::Post);
		assert!(matches!(
			factory().upsert("Account", "accountMaster__c", Some(""), Map::new()),
			Err(ValidationError::InvalidParameter { parameter: "external_id", .. })
		));
	}

	#[test]
	fn layout_and_special_endpoints() {
		let layout = factory().layout("Account", None).expect("Layout should build.");

		assert_eq!(layout.relative_url(), "/services/data/v42.0/ui-api/layout/Account?layoutType=Full");
		assert!(factory().layout("Account", Some("Tiny")).is_err());
		assert_eq!(factory().user_info().resolved_path(), "/services/oauth2/userinfo");
		assert_eq!(factory().versions().resolved_path(), "/services/data/");
		assert_eq!(factory().search_scope_and_order().path, "/v42.0/search/scopeOrder");
	}

	#[test]
	fn path_segments_are_percent_encoded() {
		let request = factory().retrieve("Account", "a b/c", None).expect("Retrieve should build.");

		assert_eq!(request.path, "/v42.0/sobjects/Account/a%20b%2Fc");
	}

	#[test]
	fn sobject_tree_requires_records() {
		assert!(factory().sobject_tree("Account", &[]).is_err());

		let tree = SObjectTree::new("Account", "Accounts", "ref1", Map::new());
		let request = factory().sobject_tree("Account", &[tree]).expect("Tree should build.");

		assert_eq!(request.path, "/v42.0/composite/tree/Account");
	}
}
