//! `User-Agent` composition.
//!
//! Analytics tooling downstream splits the header on whitespace, so the layout is a
//! compatibility contract:
//!
//! ```text
//! <AppName>/<AppVersion> <Platform>/<PlatformVersion> <SdkName>/<SdkVersion> <AppType><Qualifier>
//! ```
//!
//! The app token leads, followed by the platform and the SDK version. Every token is sanitized
//! so it never contains whitespace, and the optional qualifier is glued to the trailing
//! app-type token (for example `HybridSmartSync`).

// self
use crate::_prelude::*;

/// Kind of application embedding the client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppType {
	/// Fully native application.
	#[default]
	Native,
	/// Web-view based hybrid application.
	Hybrid,
}
impl AppType {
	/// Returns the token rendered in the header.
	pub const fn as_str(self) -> &'static str {
		match self {
			AppType::Native => "Native",
			AppType::Hybrid => "Hybrid",
		}
	}
}
impl Display for AppType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Components of the `User-Agent` header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgent {
	/// SDK product token.
	pub sdk_name: String,
	/// SDK version.
	pub sdk_version: String,
	/// Operating system name.
	pub platform: String,
	/// Operating system version.
	pub platform_version: String,
	/// Embedding application name.
	pub app_name: String,
	/// Embedding application version.
	pub app_version: String,
	/// Embedding application kind.
	pub app_type: AppType,
}
impl UserAgent {
	/// Overrides the embedding application name and version.
	pub fn with_app(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
		self.app_name = name.into();
		self.app_version = version.into();

		self
	}

	/// Overrides the application kind.
	pub fn with_app_type(mut self, app_type: AppType) -> Self {
		self.app_type = app_type;

		self
	}

	/// Overrides the platform name and version.
	pub fn with_platform(mut self, platform: impl Into<String>, version: impl Into<String>) -> Self {
		self.platform = platform.into();
		self.platform_version = version.into();

		self
	}

	/// Renders the header value without a qualifier.
	pub fn render(&self) -> String {
		self.render_with_qualifier(None)
	}

	/// Renders the header value, appending `qualifier` right after the app-type token.
	pub fn render_with_qualifier(&self, qualifier: Option<&str>) -> String {
		format!(
			"{}/{} {}/{} {}/{} {}{}",
			token(&self.app_name),
			token(&self.app_version),
			token(&self.platform),
			token(&self.platform_version),
			token(&self.sdk_name),
			token(&self.sdk_version),
			self.app_type,
			qualifier.map(token).unwrap_or_default(),
		)
	}

	/// Parses a header value produced by [`UserAgent::render_with_qualifier`].
	///
	/// Returns the components and the qualifier (if any), or `None` when the layout does not
	/// match.
	pub fn parse(value: &str) -> Option<(Self, Option<String>)> {
		let mut parts = value.split(' ');
		let (app_name, app_version) = parts.next()?.split_once('/')?;
		let (platform, platform_version) = parts.next()?.split_once('/')?;
		let (sdk_name, sdk_version) = parts.next()?.split_once('/')?;
		let kind = parts.next()?;

		if parts.next().is_some() {
			return None;
		}

		let (app_type, rest) = [AppType::Native, AppType::Hybrid]
			.into_iter()
			.find_map(|app_type| kind.strip_prefix(app_type.as_str()).map(|rest| (app_type, rest)))?;
		let qualifier = if rest.is_empty() { None } else { Some(rest.to_owned()) };
		let agent = Self {
			sdk_name: sdk_name.to_owned(),
			sdk_version: sdk_version.to_owned(),
			platform: platform.to_owned(),
			platform_version: platform_version.to_owned(),
			app_name: app_name.to_owned(),
			app_version: app_version.to_owned(),
			app_type,
		};

		Some((agent, qualifier))
	}
}
impl Default for UserAgent {
	fn default() -> Self {
		Self {
			sdk_name: "SforceRest".into(),
			sdk_version: env!("CARGO_PKG_VERSION").into(),
			platform: std::env::consts::OS.into(),
			platform_version: "unknown".into(),
			app_name: "RestClient".into(),
			app_version: "1.0".into(),
			app_type: AppType::default(),
		}
	}
}
impl Display for UserAgent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.render())
	}
}

fn token(value: &str) -> String {
	let cleaned: String = value
		.trim()
		.chars()
		.map(|c| if c.is_whitespace() || matches!(c, '/' | '(' | ')') { '_' } else { c })
		.collect();

	if cleaned.is_empty() { "unknown".into() } else { cleaned }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn fixture() -> UserAgent {
		UserAgent::default()
			.with_platform("iOS", "17.2")
			.with_app("Field Service", "4.1")
			.with_app_type(AppType::Hybrid)
	}

	#[test]
	fn renders_stable_layout() {
		let rendered = fixture().render();

		assert_eq!(
			rendered,
			format!(
				"Field_Service/4.1 iOS/17.2 SforceRest/{} Hybrid",
				env!("CARGO_PKG_VERSION")
			)
		);
	}

	#[test]
	fn qualifier_follows_app_type() {
		let rendered = fixture().render_with_qualifier(Some("SmartSync"));

		assert!(rendered.ends_with(" HybridSmartSync"));
	}

	#[test]
	fn rendered_values_parse_back() {
		let agent = fixture();
		let (parsed, qualifier) = UserAgent::parse(&agent.render_with_qualifier(Some("Sync")))
			.expect("Rendered header should parse.");

		assert_eq!(parsed.app_name, "Field_Service");
		assert_eq!(parsed.app_type, AppType::Hybrid);
		assert_eq!(parsed.platform_version, "17.2");
		assert_eq!(qualifier.as_deref(), Some("Sync"));
		assert_eq!(parsed.sdk_name, "SforceRest");
		assert!(UserAgent::parse("curl/8.0").is_none());
	}
}
