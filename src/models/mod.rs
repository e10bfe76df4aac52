// Domain models: readings (wire + parsed), snapshots, dashboard view state

mod reading;
mod snapshot;
mod view;

pub use reading::{
    FieldValue, RawStationReading, StationId, StationReading, parse_readings, parse_timestamp,
};
pub use snapshot::{ChartWindow, Snapshot, UserDistribution};
pub use view::DashboardView;
