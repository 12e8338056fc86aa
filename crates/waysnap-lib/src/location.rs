//! Input locations and their parsing from the canonical request tree.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geo::LatLng;

/// How a route treats a location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopType {
    /// The route stops here; u-turns are allowed.
    #[default]
    Break,
    /// The route passes through without stopping.
    Through,
}

impl StopType {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "break" => Some(StopType::Break),
            "through" => Some(StopType::Through),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StopType::Break => "break",
            StopType::Through => "through",
        }
    }
}

/// A geographic point plus the optional hints the spatial search honours.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub latlng: LatLng,
    pub stop_type: StopType,
    /// Preferred direction of travel in degrees clockwise from north.
    pub heading: Option<f64>,
    /// Maximum snapping distance in metres.
    pub radius: Option<f64>,
    pub name: Option<String>,
    pub street: Option<String>,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            latlng: LatLng::new(lat, lon),
            stop_type: StopType::default(),
            heading: None,
            radius: None,
            name: None,
            street: None,
        }
    }

    /// Parse a location object such as `{"lat": 50.85, "lon": 4.35, "type": "through"}`.
    ///
    /// Coordinates may be JSON numbers or numeric strings. Returns `None` when
    /// `lat`/`lon` are missing, unparsable or out of range, or when an optional
    /// hint is present but malformed.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let latlng = LatLng::new(number(object.get("lat")?)?, number(object.get("lon")?)?);
        if !latlng.is_valid() {
            return None;
        }

        let stop_type = match object.get("type") {
            Some(value) => StopType::parse(value.as_str()?)?,
            None => StopType::default(),
        };
        let heading = optional_number(object, "heading")?;
        let radius = optional_number(object, "radius")?;
        if radius.is_some_and(|radius| radius < 0.0) {
            return None;
        }

        Some(Self {
            latlng,
            stop_type,
            heading: heading.map(|heading| heading.rem_euclid(360.0)),
            radius,
            name: optional_string(object, "name"),
            street: optional_string(object, "street"),
        })
    }

    /// Parse the legacy `lat,lon[,type[,heading]]` encoding.
    pub fn from_csv(csv: &str) -> Option<Self> {
        let mut fields = csv.split(',').map(str::trim);
        let lat = fields.next()?.parse::<f64>().ok()?;
        let lon = fields.next()?.parse::<f64>().ok()?;
        let mut location = Location::new(lat, lon);
        if !location.latlng.is_valid() {
            return None;
        }

        if let Some(stop_type) = fields.next().filter(|field| !field.is_empty()) {
            location.stop_type = StopType::parse(stop_type)?;
        }
        if let Some(heading) = fields.next().filter(|field| !field.is_empty()) {
            location.heading = Some(heading.parse::<f64>().ok()?.rem_euclid(360.0));
        }
        Some(location)
    }

    /// Render the location as a canonical location object.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("lat".to_string(), Value::from(self.latlng.lat));
        object.insert("lon".to_string(), Value::from(self.latlng.lon));
        object.insert("type".to_string(), Value::from(self.stop_type.as_str()));
        if let Some(heading) = self.heading {
            object.insert("heading".to_string(), Value::from(heading));
        }
        if let Some(radius) = self.radius {
            object.insert("radius".to_string(), Value::from(radius));
        }
        if let Some(name) = &self.name {
            object.insert("name".to_string(), Value::from(name.as_str()));
        }
        if let Some(street) = &self.street {
            object.insert("street".to_string(), Value::from(street.as_str()));
        }
        Value::Object(object)
    }
}

fn number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|number| number.is_finite())
}

/// `Some(None)` when absent, `None` when present but not a number.
fn optional_number(object: &Map<String, Value>, key: &str) -> Option<Option<f64>> {
    match object.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(value) => number(value).map(Some),
    }
}

fn optional_string(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}
