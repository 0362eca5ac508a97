//! Coverage variables and their value domains.
//!
//! Every axis of the environment space is a [`CoverageVariable`]; every
//! concrete value is a [`CoverageValue`] tagged with the variable it belongs
//! to, so a value can never be filed under the wrong axis.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares a closed set of symbolic values with stable persisted labels.
macro_rules! symbolic_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every value, in declaration order
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Persisted label
            #[must_use]
            pub const fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }

            /// Parse a persisted label
            #[must_use]
            pub fn from_label(label: &str) -> Option<Self> {
                match label {
                    $($label => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

symbolic_enum! {
    /// Precipitation intensity bucket
    WeatherLevel {
        /// No precipitation
        None => "NONE",
        /// Up to 25%
        VeryLight => "VERY_LIGHT",
        /// Up to 50%
        Light => "LIGHT",
        /// Up to 75%
        Mid => "MID",
        /// Above 75%
        Heavy => "HEAVY",
    }
}

impl WeatherLevel {
    /// Bucket a 0-100 simulator weather parameter
    #[must_use]
    pub fn from_percent(value: f64) -> Self {
        if value <= 0.0 {
            Self::None
        } else if value <= 25.0 {
            Self::VeryLight
        } else if value <= 50.0 {
            Self::Light
        } else if value <= 75.0 {
            Self::Mid
        } else {
            Self::Heavy
        }
    }
}

symbolic_enum! {
    /// Whether some kind of actor is present
    Presence {
        /// At least one present
        Present => "TRUE",
        /// None present
        Absent => "FALSE",
    }
}

impl From<bool> for Presence {
    fn from(present: bool) -> Self {
        if present {
            Self::Present
        } else {
            Self::Absent
        }
    }
}

symbolic_enum! {
    /// Posted speed limit
    SpeedLimit {
        /// 5 km/h
        Five => "FIVE",
        /// 10 km/h
        Ten => "TEN",
        /// 20 km/h
        Twenty => "TWENTY",
        /// 30 km/h
        Thirty => "THIRTY",
        /// 40 km/h
        Forty => "FORTY",
        /// 50 km/h
        Fifty => "FIFTY",
        /// 60 km/h
        Sixty => "SIXTY",
        /// 70 km/h
        Seventy => "SEVENTY",
        /// 80 km/h
        Eighty => "EIGHTY",
        /// 90 km/h
        Ninety => "NINETY",
        /// 100 km/h
        Hundred => "HUNDRED",
    }
}

impl SpeedLimit {
    /// Limit in km/h
    #[must_use]
    pub const fn kmh(self) -> u32 {
        match self {
            Self::Five => 5,
            Self::Ten => 10,
            Self::Twenty => 20,
            Self::Thirty => 30,
            Self::Forty => 40,
            Self::Fifty => 50,
            Self::Sixty => 60,
            Self::Seventy => 70,
            Self::Eighty => 80,
            Self::Ninety => 90,
            Self::Hundred => 100,
        }
    }

    /// Exact match on a km/h value
    #[must_use]
    pub fn from_kmh(kmh: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|limit| limit.kmh() == kmh)
    }
}

symbolic_enum! {
    /// Road connectivity around the vehicle as an ahead/right/behind/left
    /// bit pattern (`T` = a road leaves in that direction).
    RoadGraph {
        /// left only
        Ffft => "FFFT",
        /// behind only (dead end)
        Fftf => "FFTF",
        /// behind and left
        Fftt => "FFTT",
        /// right only
        Ftff => "FTFF",
        /// right and left
        Ftft => "FTFT",
        /// right and behind
        Fttf => "FTTF",
        /// right, behind and left
        Fttt => "FTTT",
        /// ahead only
        Tfff => "TFFF",
        /// ahead and left
        Tfft => "TFFT",
        /// ahead and behind (plain road)
        Tftf => "TFTF",
        /// ahead, behind and left
        Tftt => "TFTT",
        /// ahead and right
        Ttff => "TTFF",
        /// ahead, right and left
        Ttft => "TTFT",
        /// ahead, right and behind
        Tttf => "TTTF",
        /// four-way
        Tttt => "TTTT",
    }
}

impl RoadGraph {
    /// Build from connectivity flags; `None` when no direction is connected
    #[must_use]
    pub fn from_flags(ahead: bool, right: bool, behind: bool, left: bool) -> Option<Self> {
        let label: String = [ahead, right, behind, left]
            .iter()
            .map(|&flag| if flag { 'T' } else { 'F' })
            .collect();
        Self::from_label(&label)
    }

    /// Number of connected directions
    #[must_use]
    pub fn arms(self) -> usize {
        self.label().chars().filter(|&c| c == 'T').count()
    }

    /// Shapes with three or more arms, i.e. an actual junction
    #[must_use]
    pub fn junction_shapes() -> Vec<Self> {
        Self::ALL.iter().copied().filter(|g| g.arms() >= 3).collect()
    }
}

symbolic_enum! {
    /// Emergency vehicles in the scene
    EmergencyStatus {
        /// No emergency vehicle
        None => "NONE",
        /// Emergency vehicle present, siren off
        Present => "PRESENT",
        /// Emergency vehicle with siren on
        Active => "ACTIVE",
    }
}

symbolic_enum! {
    /// Light conditions derived from the sun altitude
    TimeOfDay {
        /// Sun above 6 degrees
        Day => "DAY",
        /// Civil twilight
        Dusk => "DUSK",
        /// Sun below -6 degrees
        Night => "NIGHT",
    }
}

impl TimeOfDay {
    /// Classify a sun altitude angle in degrees
    #[must_use]
    pub fn from_sun_altitude(degrees: f64) -> Self {
        if degrees < -6.0 {
            Self::Night
        } else if degrees <= 6.0 {
            Self::Dusk
        } else {
            Self::Day
        }
    }
}

/// How a variable's column is encoded in the coverage table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Symbolic label
    Enum,
    /// Non-negative integer
    Count,
}

impl ColumnKind {
    /// Tag written in the table header
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Enum => "enum",
            Self::Count => "count",
        }
    }

    /// Parse a header tag
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "enum" => Some(Self::Enum),
            "count" => Some(Self::Count),
            _ => None,
        }
    }
}

/// One axis of the coverage space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageVariable {
    /// Precipitation
    Rain,
    /// Standing water on the road
    GroundWater,
    /// Number of other vehicles
    NumVehicles,
    /// Number of pedestrians
    NumPedestrians,
    /// Two-wheelers present
    BikesPresent,
    /// Four-wheelers present
    CarsPresent,
    /// Posted speed limit
    SpeedLimit,
    /// Local road connectivity
    RoadGraph,
    /// Emergency vehicle status
    EmergencyVehicle,
    /// Light conditions
    TimeOfDay,
}

impl CoverageVariable {
    /// Every variable
    pub const ALL: &'static [Self] = &[
        Self::Rain,
        Self::GroundWater,
        Self::NumVehicles,
        Self::NumPedestrians,
        Self::BikesPresent,
        Self::CarsPresent,
        Self::SpeedLimit,
        Self::RoadGraph,
        Self::EmergencyVehicle,
        Self::TimeOfDay,
    ];

    /// Column name in the coverage table
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rain => "RAIN",
            Self::GroundWater => "GROUND_WATER",
            Self::NumVehicles => "NUM_VEHICLES",
            Self::NumPedestrians => "NUM_PEDESTRIANS",
            Self::BikesPresent => "BIKES_PRESENT",
            Self::CarsPresent => "CARS_PRESENT",
            Self::SpeedLimit => "SPEED_LIMIT",
            Self::RoadGraph => "ROAD_GRAPH",
            Self::EmergencyVehicle => "EMERGENCY_VEHICLE",
            Self::TimeOfDay => "TIME_OF_DAY",
        }
    }

    /// Look up a variable by column name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.name() == name)
    }

    /// Column encoding
    #[must_use]
    pub const fn kind(self) -> ColumnKind {
        match self {
            Self::NumVehicles | Self::NumPedestrians => ColumnKind::Count,
            _ => ColumnKind::Enum,
        }
    }

    /// The closed set of values for symbolic variables; `None` for counts
    #[must_use]
    pub fn symbolic_values(self) -> Option<Vec<CoverageValue>> {
        let values = match self {
            Self::Rain => WeatherLevel::ALL.iter().map(|&v| CoverageValue::Rain(v)).collect(),
            Self::GroundWater => WeatherLevel::ALL
                .iter()
                .map(|&v| CoverageValue::GroundWater(v))
                .collect(),
            Self::BikesPresent => Presence::ALL
                .iter()
                .map(|&v| CoverageValue::BikesPresent(v))
                .collect(),
            Self::CarsPresent => Presence::ALL
                .iter()
                .map(|&v| CoverageValue::CarsPresent(v))
                .collect(),
            Self::SpeedLimit => SpeedLimit::ALL
                .iter()
                .map(|&v| CoverageValue::SpeedLimit(v))
                .collect(),
            Self::RoadGraph => RoadGraph::ALL
                .iter()
                .map(|&v| CoverageValue::RoadGraph(v))
                .collect(),
            Self::EmergencyVehicle => EmergencyStatus::ALL
                .iter()
                .map(|&v| CoverageValue::EmergencyVehicle(v))
                .collect(),
            Self::TimeOfDay => TimeOfDay::ALL
                .iter()
                .map(|&v| CoverageValue::TimeOfDay(v))
                .collect(),
            Self::NumVehicles | Self::NumPedestrians => return None,
        };
        Some(values)
    }

    /// Build a count value for this variable; `None` for symbolic variables
    #[must_use]
    pub const fn count_value(self, count: u32) -> Option<CoverageValue> {
        match self {
            Self::NumVehicles => Some(CoverageValue::NumVehicles(count)),
            Self::NumPedestrians => Some(CoverageValue::NumPedestrians(count)),
            _ => None,
        }
    }

    /// Parse a table cell for this variable
    #[must_use]
    pub fn parse_cell(self, cell: &str) -> Option<CoverageValue> {
        match self {
            Self::Rain => WeatherLevel::from_label(cell).map(CoverageValue::Rain),
            Self::GroundWater => WeatherLevel::from_label(cell).map(CoverageValue::GroundWater),
            Self::BikesPresent => Presence::from_label(cell).map(CoverageValue::BikesPresent),
            Self::CarsPresent => Presence::from_label(cell).map(CoverageValue::CarsPresent),
            Self::SpeedLimit => SpeedLimit::from_label(cell).map(CoverageValue::SpeedLimit),
            Self::RoadGraph => RoadGraph::from_label(cell).map(CoverageValue::RoadGraph),
            Self::EmergencyVehicle => {
                EmergencyStatus::from_label(cell).map(CoverageValue::EmergencyVehicle)
            }
            Self::TimeOfDay => TimeOfDay::from_label(cell).map(CoverageValue::TimeOfDay),
            Self::NumVehicles | Self::NumPedestrians => cell
                .parse::<u32>()
                .ok()
                .and_then(|count| self.count_value(count)),
        }
    }
}

impl fmt::Display for CoverageVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A concrete value on one coverage axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "variable", content = "value", rename_all = "snake_case")]
pub enum CoverageValue {
    /// Precipitation level
    Rain(WeatherLevel),
    /// Standing water level
    GroundWater(WeatherLevel),
    /// Other vehicles
    NumVehicles(u32),
    /// Pedestrians
    NumPedestrians(u32),
    /// Two-wheelers present
    BikesPresent(Presence),
    /// Four-wheelers present
    CarsPresent(Presence),
    /// Speed limit
    SpeedLimit(SpeedLimit),
    /// Road connectivity
    RoadGraph(RoadGraph),
    /// Emergency vehicles
    EmergencyVehicle(EmergencyStatus),
    /// Light conditions
    TimeOfDay(TimeOfDay),
}

impl CoverageValue {
    /// The axis this value belongs to
    #[must_use]
    pub const fn variable(&self) -> CoverageVariable {
        match self {
            Self::Rain(_) => CoverageVariable::Rain,
            Self::GroundWater(_) => CoverageVariable::GroundWater,
            Self::NumVehicles(_) => CoverageVariable::NumVehicles,
            Self::NumPedestrians(_) => CoverageVariable::NumPedestrians,
            Self::BikesPresent(_) => CoverageVariable::BikesPresent,
            Self::CarsPresent(_) => CoverageVariable::CarsPresent,
            Self::SpeedLimit(_) => CoverageVariable::SpeedLimit,
            Self::RoadGraph(_) => CoverageVariable::RoadGraph,
            Self::EmergencyVehicle(_) => CoverageVariable::EmergencyVehicle,
            Self::TimeOfDay(_) => CoverageVariable::TimeOfDay,
        }
    }

    /// Integer payload of count values
    #[must_use]
    pub const fn count(&self) -> Option<u32> {
        match self {
            Self::NumVehicles(n) | Self::NumPedestrians(n) => Some(*n),
            _ => None,
        }
    }

    /// Table cell text
    #[must_use]
    pub fn cell(&self) -> String {
        match self {
            Self::Rain(v) | Self::GroundWater(v) => v.label().to_string(),
            Self::NumVehicles(n) | Self::NumPedestrians(n) => n.to_string(),
            Self::BikesPresent(v) | Self::CarsPresent(v) => v.label().to_string(),
            Self::SpeedLimit(v) => v.label().to_string(),
            Self::RoadGraph(v) => v.label().to_string(),
            Self::EmergencyVehicle(v) => v.label().to_string(),
            Self::TimeOfDay(v) => v.label().to_string(),
        }
    }
}

impl fmt::Display for CoverageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.variable(), self.cell())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_buckets() {
        assert_eq!(WeatherLevel::from_percent(0.0), WeatherLevel::None);
        assert_eq!(WeatherLevel::from_percent(25.0), WeatherLevel::VeryLight);
        assert_eq!(WeatherLevel::from_percent(50.0), WeatherLevel::Light);
        assert_eq!(WeatherLevel::from_percent(75.0), WeatherLevel::Mid);
        assert_eq!(WeatherLevel::from_percent(75.1), WeatherLevel::Heavy);
    }

    #[test]
    fn test_speed_limit_lookup() {
        assert_eq!(SpeedLimit::from_kmh(30), Some(SpeedLimit::Thirty));
        assert_eq!(SpeedLimit::from_kmh(35), None);
    }

    #[test]
    fn test_road_graph_flags() {
        assert_eq!(
            RoadGraph::from_flags(true, false, true, false),
            Some(RoadGraph::Tftf)
        );
        assert_eq!(RoadGraph::from_flags(false, false, false, false), None);
        assert_eq!(RoadGraph::junction_shapes().len(), 5);
    }

    #[test]
    fn test_time_of_day() {
        assert_eq!(TimeOfDay::from_sun_altitude(45.0), TimeOfDay::Day);
        assert_eq!(TimeOfDay::from_sun_altitude(0.0), TimeOfDay::Dusk);
        assert_eq!(TimeOfDay::from_sun_altitude(-30.0), TimeOfDay::Night);
    }

    #[test]
    fn test_cells_parse_back() {
        for variable in CoverageVariable::ALL {
            if let Some(values) = variable.symbolic_values() {
                for value in values {
                    assert_eq!(variable.parse_cell(&value.cell()), Some(value));
                }
            }
        }
        assert_eq!(
            CoverageVariable::NumVehicles.parse_cell("12"),
            Some(CoverageValue::NumVehicles(12))
        );
        assert_eq!(CoverageVariable::NumVehicles.parse_cell("-1"), None);
        assert_eq!(CoverageVariable::Rain.parse_cell("DRIZZLE"), None);
    }

    #[test]
    fn test_variable_names_unique() {
        for variable in CoverageVariable::ALL {
            assert_eq!(CoverageVariable::from_name(variable.name()), Some(*variable));
        }
    }
}
