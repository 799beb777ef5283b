//! State predicates: a condition on a reading plus routing metadata.
//!
//! A [`Condition`] is a closed variant over the three shapes (scalar,
//! interval, region). Each shape has its own comparator enum, so a typed
//! caller cannot build an interval-only test on a scalar condition. Callers
//! holding an untyped [`Comparator`] (for example one parsed from a script
//! string) go through [`Condition::scalar_with`] and friends, which reject a
//! comparator that does not belong to the shape.
//!
//! A [`Predicate`] adds where the reading comes from ([`Source`]), which
//! channel to read, and an optional callback. A predicate with no callback
//! terminates the wait when satisfied; one with a callback invokes it and
//! stays out of the way.
//!
//! # Example
//!
//! ```
//! use cue_events::device::DeviceKind;
//! use cue_events::predicate::{Condition, IntervalTest, Predicate, Reading, Source};
//!
//! let cond = Condition::interval(10, 20, IntervalTest::Inside);
//! assert!(cond.evaluate(Reading::Scalar(10)).unwrap());
//! assert!(cond.evaluate(Reading::Scalar(20)).unwrap());
//! assert!(!cond.evaluate(Reading::Scalar(21)).unwrap());
//!
//! let p = Predicate::polled(DeviceKind::Joystick(0), 1, cond);
//! assert!(p.is_terminating());
//! assert_eq!(p.source, Source::Polled(DeviceKind::Joystick(0)));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::device::{Device, DeviceKind, Point};
use crate::record::{EventKind, EventRecord};
use crate::value::ScriptValue;
use crate::EventError;

// ---------------------------------------------------------------------------
// Comparators
// ---------------------------------------------------------------------------

/// Any comparator, independent of shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    AlwaysTrue,
    AlwaysFalse,
    Inside,
    Outside,
    NotInside,
    NotOutside,
    OnEdge,
}

impl Comparator {
    /// The script name of this comparator, e.g. `"<GEQ>"`.
    pub fn script_name(self) -> &'static str {
        match self {
            Comparator::Equal => "<EQUAL>",
            Comparator::NotEqual => "<NOTEQUAL>",
            Comparator::Less => "<LESSTHAN>",
            Comparator::Greater => "<GREATERTHAN>",
            Comparator::LessOrEqual => "<LEQ>",
            Comparator::GreaterOrEqual => "<GEQ>",
            Comparator::AlwaysTrue => "<TRUE>",
            Comparator::AlwaysFalse => "<FALSE>",
            Comparator::Inside => "<INSIDE>",
            Comparator::Outside => "<OUTSIDE>",
            Comparator::NotInside => "<NOT_INSIDE>",
            Comparator::NotOutside => "<NOT_OUTSIDE>",
            Comparator::OnEdge => "<ON_EDGE>",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.script_name())
    }
}

impl FromStr for Comparator {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = match s {
            "<EQUAL>" => Comparator::Equal,
            "<NOTEQUAL>" => Comparator::NotEqual,
            "<LESSTHAN>" => Comparator::Less,
            "<GREATERTHAN>" => Comparator::Greater,
            "<LEQ>" => Comparator::LessOrEqual,
            "<GEQ>" => Comparator::GreaterOrEqual,
            "<TRUE>" => Comparator::AlwaysTrue,
            "<FALSE>" => Comparator::AlwaysFalse,
            "<INSIDE>" => Comparator::Inside,
            "<OUTSIDE>" => Comparator::Outside,
            "<NOT_INSIDE>" => Comparator::NotInside,
            "<NOT_OUTSIDE>" => Comparator::NotOutside,
            "<ON_EDGE>" => Comparator::OnEdge,
            other => return Err(EventError::UnknownComparator(other.to_owned())),
        };
        Ok(c)
    }
}

/// Shape of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    Scalar,
    Interval,
    Region,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Shape::Scalar => "scalar",
            Shape::Interval => "interval",
            Shape::Region => "region",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarTest {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    AlwaysTrue,
    AlwaysFalse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntervalTest {
    Inside,
    Outside,
    NotInside,
    NotOutside,
    AlwaysTrue,
    AlwaysFalse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionTest {
    Inside,
    Outside,
    NotInside,
    NotOutside,
    OnEdge,
}

fn mismatch(shape: Shape, comparator: Comparator) -> EventError {
    EventError::InvalidComparator { shape, comparator }
}

impl TryFrom<Comparator> for ScalarTest {
    type Error = EventError;

    fn try_from(c: Comparator) -> Result<Self, Self::Error> {
        Ok(match c {
            Comparator::Equal => ScalarTest::Equal,
            Comparator::NotEqual => ScalarTest::NotEqual,
            Comparator::Less => ScalarTest::Less,
            Comparator::Greater => ScalarTest::Greater,
            Comparator::LessOrEqual => ScalarTest::LessOrEqual,
            Comparator::GreaterOrEqual => ScalarTest::GreaterOrEqual,
            Comparator::AlwaysTrue => ScalarTest::AlwaysTrue,
            Comparator::AlwaysFalse => ScalarTest::AlwaysFalse,
            other => return Err(mismatch(Shape::Scalar, other)),
        })
    }
}

impl TryFrom<Comparator> for IntervalTest {
    type Error = EventError;

    fn try_from(c: Comparator) -> Result<Self, Self::Error> {
        Ok(match c {
            Comparator::Inside => IntervalTest::Inside,
            Comparator::Outside => IntervalTest::Outside,
            Comparator::NotInside => IntervalTest::NotInside,
            Comparator::NotOutside => IntervalTest::NotOutside,
            Comparator::AlwaysTrue => IntervalTest::AlwaysTrue,
            Comparator::AlwaysFalse => IntervalTest::AlwaysFalse,
            other => return Err(mismatch(Shape::Interval, other)),
        })
    }
}

impl TryFrom<Comparator> for RegionTest {
    type Error = EventError;

    fn try_from(c: Comparator) -> Result<Self, Self::Error> {
        Ok(match c {
            Comparator::Inside => RegionTest::Inside,
            Comparator::Outside => RegionTest::Outside,
            Comparator::NotInside => RegionTest::NotInside,
            Comparator::NotOutside => RegionTest::NotOutside,
            Comparator::OnEdge => RegionTest::OnEdge,
            other => return Err(mismatch(Shape::Region, other)),
        })
    }
}

// ---------------------------------------------------------------------------
// Rect
// ---------------------------------------------------------------------------

/// A closed rectangle with normalized corners (`x1 <= x2`, `y1 <= y2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    x1: i64,
    y1: i64,
    x2: i64,
    y2: i64,
}

impl Rect {
    /// Build from any two opposite corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x1: a.x.min(b.x),
            y1: a.y.min(b.y),
            x2: a.x.max(b.x),
            y2: a.y.max(b.y),
        }
    }

    /// True when `p` lies inside or on the boundary.
    ///
    /// ```
    /// use cue_events::device::Point;
    /// use cue_events::predicate::Rect;
    ///
    /// let r = Rect::from_corners(Point::new(10, 10), Point::new(0, 0));
    /// assert!(r.contains(Point::new(10, 5)));
    /// assert!(!r.contains(Point::new(11, 5)));
    /// ```
    pub fn contains(&self, p: Point) -> bool {
        (self.x1..=self.x2).contains(&p.x) && (self.y1..=self.y2).contains(&p.y)
    }

    /// True when `p` lies on one of the four boundary segments.
    pub fn on_edge(&self, p: Point) -> bool {
        self.contains(p) && (p.x == self.x1 || p.x == self.x2 || p.y == self.y1 || p.y == self.y2)
    }

    /// The top-left and bottom-right corners, after normalization.
    pub fn corners(&self) -> (Point, Point) {
        (Point::new(self.x1, self.y1), Point::new(self.x2, self.y2))
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// A reading handed to [`Condition::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    Scalar(i64),
    Point(Point),
}

/// Shape, comparator and bounds of a state predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Scalar { target: i64, test: ScalarTest },
    /// Bounds are inclusive and kept as given; `low > high` makes `Inside`
    /// unsatisfiable.
    Interval { low: i64, high: i64, test: IntervalTest },
    Region { rect: Rect, test: RegionTest },
}

impl Condition {
    /// Compare a scalar reading against `target`.
    pub fn scalar(target: i64, test: ScalarTest) -> Self {
        Condition::Scalar { target, test }
    }

    /// Test a scalar reading against the inclusive range `[low, high]`.
    pub fn interval(low: i64, high: i64, test: IntervalTest) -> Self {
        Condition::Interval { low, high, test }
    }

    /// Test a planar reading against the rectangle spanned by `a` and `b`.
    /// The corners may be given in any order.
    pub fn region(a: Point, b: Point, test: RegionTest) -> Self {
        Condition::Region {
            rect: Rect::from_corners(a, b),
            test,
        }
    }

    /// Scalar condition from an untyped comparator.
    ///
    /// # Errors
    ///
    /// [`EventError::InvalidComparator`] if `comparator` is not a scalar test.
    pub fn scalar_with(target: i64, comparator: Comparator) -> Result<Self, EventError> {
        Ok(Self::scalar(target, comparator.try_into()?))
    }

    /// Interval condition from an untyped comparator.
    ///
    /// # Errors
    ///
    /// [`EventError::InvalidComparator`] if `comparator` is not an interval
    /// test.
    pub fn interval_with(low: i64, high: i64, comparator: Comparator) -> Result<Self, EventError> {
        Ok(Self::interval(low, high, comparator.try_into()?))
    }

    /// Region condition from an untyped comparator.
    ///
    /// # Errors
    ///
    /// [`EventError::InvalidComparator`] if `comparator` is not a region
    /// test.
    pub fn region_with(a: Point, b: Point, comparator: Comparator) -> Result<Self, EventError> {
        Ok(Self::region(a, b, comparator.try_into()?))
    }

    /// Which kind of reading the condition needs.
    pub fn shape(&self) -> Shape {
        match self {
            Condition::Scalar { .. } => Shape::Scalar,
            Condition::Interval { .. } => Shape::Interval,
            Condition::Region { .. } => Shape::Region,
        }
    }

    /// Evaluate the condition against one reading.
    ///
    /// # Errors
    ///
    /// [`EventError::ReadingMismatch`] when a region condition receives a
    /// scalar or a scalar/interval condition receives a point.
    pub fn evaluate(&self, reading: Reading) -> Result<bool, EventError> {
        let outcome = match (self, reading) {
            (Condition::Scalar { target, test }, Reading::Scalar(v)) => match test {
                ScalarTest::Equal => v == *target,
                ScalarTest::NotEqual => v != *target,
                ScalarTest::Less => v < *target,
                ScalarTest::Greater => v > *target,
                ScalarTest::LessOrEqual => v <= *target,
                ScalarTest::GreaterOrEqual => v >= *target,
                ScalarTest::AlwaysTrue => true,
                ScalarTest::AlwaysFalse => false,
            },
            (Condition::Interval { low, high, test }, Reading::Scalar(v)) => {
                let inside = *low <= v && v <= *high;
                match test {
                    IntervalTest::Inside | IntervalTest::NotOutside => inside,
                    IntervalTest::Outside | IntervalTest::NotInside => !inside,
                    IntervalTest::AlwaysTrue => true,
                    IntervalTest::AlwaysFalse => false,
                }
            }
            (Condition::Region { rect, test }, Reading::Point(p)) => match test {
                RegionTest::Inside | RegionTest::NotOutside => rect.contains(p),
                RegionTest::Outside | RegionTest::NotInside => !rect.contains(p),
                RegionTest::OnEdge => rect.on_edge(p),
            },
            (cond, _) => {
                return Err(EventError::ReadingMismatch {
                    shape: cond.shape(),
                })
            }
        };
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Predicate
// ---------------------------------------------------------------------------

/// Registry handle of a predicate, unique within one event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PredicateId(pub u64);

impl fmt::Display for PredicateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a predicate's reading comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// Read from a device each tick.
    Polled(DeviceKind),
    /// Tested against queued records of this kind.
    Queue(EventKind),
}

/// A condition plus routing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub condition: Condition,
    pub channel: i64,
    pub source: Source,
    /// Script function to invoke instead of ending the wait.
    pub callback: Option<String>,
    /// Forwarded verbatim to the callback.
    pub parameter: ScriptValue,
}

impl Predicate {
    /// A terminating predicate tested against `device` on every tick.
    pub fn polled(device: DeviceKind, channel: i64, condition: Condition) -> Self {
        Self {
            condition,
            channel,
            source: Source::Polled(device),
            callback: None,
            parameter: ScriptValue::default(),
        }
    }

    /// A terminating predicate tested against each queued record of `kind`.
    pub fn queued(kind: EventKind, channel: i64, condition: Condition) -> Self {
        Self {
            condition,
            channel,
            source: Source::Queue(kind),
            callback: None,
            parameter: ScriptValue::default(),
        }
    }

    /// Route matches to `name` instead of terminating. An empty name keeps
    /// the predicate terminating.
    pub fn with_callback(mut self, name: impl Into<String>, parameter: ScriptValue) -> Self {
        let name = name.into();
        self.callback = (!name.is_empty()).then_some(name);
        self.parameter = parameter;
        self
    }

    /// Whether a match ends the run, as opposed to invoking a callback.
    pub fn is_terminating(&self) -> bool {
        self.callback.is_none()
    }

    /// Whether the predicate reads a device rather than the queue.
    pub fn is_polled(&self) -> bool {
        matches!(self.source, Source::Polled(_))
    }

    /// Read this predicate's channel from `device` in the shape the
    /// condition needs.
    ///
    /// # Errors
    ///
    /// - [`EventError::MissingPoint`] when a region predicate targets a
    ///   device with no planar reading on the channel.
    /// - Whatever [`Device::read_value`] reports for scalar readings.
    pub fn read(&self, device: &dyn Device) -> Result<Reading, EventError> {
        match self.condition.shape() {
            Shape::Region => device
                .read_point(self.channel)
                .map(Reading::Point)
                .ok_or(EventError::MissingPoint {
                    channel: self.channel,
                }),
            Shape::Scalar | Shape::Interval => {
                Ok(Reading::Scalar(device.read_value(self.channel)?))
            }
        }
    }

    /// Derive this predicate's reading from a queued record.
    ///
    /// # Errors
    ///
    /// - [`EventError::MissingPoint`] for a region predicate on a record
    ///   with no cursor position.
    /// - [`EventError::NoScalarDerivation`] for dummy records.
    pub fn read_record(&self, record: &EventRecord) -> Result<Reading, EventError> {
        match self.condition.shape() {
            Shape::Region => record
                .derive_point()
                .map(Reading::Point)
                .ok_or(EventError::MissingPoint {
                    channel: self.channel,
                }),
            Shape::Scalar | Shape::Interval => {
                Ok(Reading::Scalar(record.derive_scalar(self.channel)?))
            }
        }
    }

    /// Whether a queued record is one this predicate looks at.
    pub fn accepts(&self, record: &EventRecord) -> bool {
        self.source == Source::Queue(record.kind())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
