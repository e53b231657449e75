use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_TITLE: &str = "设备健康诊断报告";
pub const PLACEHOLDER_REPORT_ID: &str = "DX-00000000-001";

#[derive(Debug, thiserror::Error)]
#[error("Field {field} is invalid: {message}")]
pub struct SchemaError {
	pub field: String,
	pub message: String,
}
impl SchemaError {
	fn new(field: &str, message: impl Into<String>) -> Self {
		Self { field: field.to_string(), message: message.into() }
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthStatus {
	Normal,
	Warning,
	Abnormal,
	Critical,
}
impl HealthStatus {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim() {
			"正常" => Some(Self::Normal),
			"警告" => Some(Self::Warning),
			"异常" => Some(Self::Abnormal),
			"严重" => Some(Self::Critical),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Normal => "正常",
			Self::Warning => "警告",
			Self::Abnormal => "异常",
			Self::Critical => "严重",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RiskLevel {
	Low,
	Medium,
	High,
}
impl RiskLevel {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim() {
			"低" => Some(Self::Low),
			"中" => Some(Self::Medium),
			"高" => Some(Self::High),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Low => "低",
			Self::Medium => "中",
			Self::High => "高",
		}
	}
}

/// Validated diagnosis fields handed to the report renderer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisRecord {
	pub title: String,
	/// `DX-YYYYMMDD-NNN`.
	pub report_id: String,
	pub device_name: String,
	pub device_model: String,
	pub location: String,
	pub diagnosis_date: String,
	pub data_range: String,

	pub health_score: u8,
	/// Kept verbatim. See [`DiagnosisRecord::health_status`].
	pub health_status: String,
	pub risk_level: String,
	pub issue_count: u32,

	pub r#abstract: String,
	pub device_basic_info: String,
	pub operating_environment: String,
	pub maintenance_history: String,

	pub monitoring_data_summary: String,
	pub key_metrics_analysis: String,
	pub trend_analysis: String,
	pub anomaly_detection: String,

	pub fault_description: String,
	pub fault_cause_analysis: String,
	pub fault_location: String,

	pub urgent_measures: String,
	pub maintenance_plan: String,
	pub spare_parts_suggestion: String,

	pub current_risks: String,
	pub potential_risks: String,
	pub risk_control: String,

	pub conclusion_and_recommendations: String,
	pub technical_parameters: String,
	pub related_standards: String,
	pub diagnosis_method: String,
}
impl DiagnosisRecord {
	/// Validates a loosely typed field map.
	///
	/// `health_score` and `issue_count` accept integers, integral floats and numeral text;
	/// text that does not parse becomes 0. Text fields accept strings, with missing or null
	/// values taking their defaults. Keys outside the schema are ignored. `device_name` is
	/// required.
	pub fn from_fields(fields: &Map<String, Value>) -> Result<Self, SchemaError> {
		let text = |key: &str, default: &str| text_field(fields, key, default);
		let device_name = match fields.get("device_name") {
			Some(Value::String(name)) => name.clone(),
			Some(Value::Null) | None => return Err(SchemaError::new("device_name", "is required")),
			Some(_) => return Err(SchemaError::new("device_name", "must be a string")),
		};
		let health_score = integer_field(fields, "health_score")?;
		let issue_count = integer_field(fields, "issue_count")?;

		if !(0..=100).contains(&health_score) {
			return Err(SchemaError::new("health_score", "must be in the range 0-100"));
		}
		if issue_count < 0 {
			return Err(SchemaError::new("issue_count", "must be zero or greater"));
		}

		let record = Self {
			title: text("title", DEFAULT_TITLE)?,
			report_id: text("report_id", PLACEHOLDER_REPORT_ID)?,
			device_name,
			device_model: text("device_model", "未知型号")?,
			location: text("location", "未知位置")?,
			diagnosis_date: text("diagnosis_date", "")?,
			data_range: text("data_range", "")?,
			health_score: health_score as u8,
			health_status: text("health_status", HealthStatus::Normal.as_str())?,
			risk_level: text("risk_level", RiskLevel::Low.as_str())?,
			issue_count: u32::try_from(issue_count)
				.map_err(|_| SchemaError::new("issue_count", "is too large"))?,
			r#abstract: text("abstract", "")?,
			device_basic_info: text("device_basic_info", "")?,
			operating_environment: text("operating_environment", "")?,
			maintenance_history: text("maintenance_history", "")?,
			monitoring_data_summary: text("monitoring_data_summary", "")?,
			key_metrics_analysis: text("key_metrics_analysis", "")?,
			trend_analysis: text("trend_analysis", "")?,
			anomaly_detection: text("anomaly_detection", "")?,
			fault_description: text("fault_description", "")?,
			fault_cause_analysis: text("fault_cause_analysis", "")?,
			fault_location: text("fault_location", "")?,
			urgent_measures: text("urgent_measures", "")?,
			maintenance_plan: text("maintenance_plan", "")?,
			spare_parts_suggestion: text("spare_parts_suggestion", "")?,
			current_risks: text("current_risks", "")?,
			potential_risks: text("potential_risks", "")?,
			risk_control: text("risk_control", "")?,
			conclusion_and_recommendations: text("conclusion_and_recommendations", "")?,
			technical_parameters: text("technical_parameters", "")?,
			related_standards: text("related_standards", "")?,
			diagnosis_method: text("diagnosis_method", "")?,
		};

		if record.health_status().is_none() {
			tracing::warn!(
				value = %record.health_status,
				"Health status is outside the known vocabulary. Keeping it as-is."
			);
		}
		if record.risk_level().is_none() {
			tracing::warn!(
				value = %record.risk_level,
				"Risk level is outside the known vocabulary. Keeping it as-is."
			);
		}

		Ok(record)
	}

	pub fn health_status(&self) -> Option<HealthStatus> {
		HealthStatus::parse(&self.health_status)
	}

	pub fn risk_level(&self) -> Option<RiskLevel> {
		RiskLevel::parse(&self.risk_level)
	}

	pub fn to_fields(&self) -> Map<String, Value> {
		match serde_json::to_value(self) {
			Ok(Value::Object(map)) => map,
			_ => Map::new(),
		}
	}
}

/// Numeral text becomes an integer; any other text becomes 0. Non-text values pass through.
pub fn coerce_integer(value: &Value) -> Value {
	match value {
		Value::String(raw) => Value::from(raw.trim().parse::<i64>().unwrap_or(0)),
		other => other.clone(),
	}
}

fn integer_field(fields: &Map<String, Value>, key: &str) -> Result<i64, SchemaError> {
	let Some(value) = fields.get(key) else {
		return Ok(0);
	};

	match coerce_integer(value) {
		Value::Null => Ok(0),
		Value::Number(number) => {
			if let Some(int) = number.as_i64() {
				return Ok(int);
			}

			match number.as_f64() {
				Some(float) if float.fract() == 0.0 && float.abs() < i64::MAX as f64 =>
					Ok(float as i64),
				_ => Err(SchemaError::new(key, "must be an integer")),
			}
		},
		_ => Err(SchemaError::new(key, "must be an integer")),
	}
}

fn text_field(
	fields: &Map<String, Value>,
	key: &str,
	default: &str,
) -> Result<String, SchemaError> {
	match fields.get(key) {
		None | Some(Value::Null) => Ok(default.to_string()),
		Some(Value::String(value)) => Ok(value.clone()),
		Some(_) => Err(SchemaError::new(key, "must be a string")),
	}
}
