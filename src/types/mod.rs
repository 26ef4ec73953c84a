//! Domain types

pub mod import;
pub mod property;
pub mod room;

pub use import::{ImportIssue, ImportIssueLevel, ImportReport};
pub use property::{
    property_key, GeoCoord, KindCategory, Location, Management, Name, Property,
    PropertyWithRooms, StoredProperty, StoredRoom,
};
pub use room::{tenant_id, Contract, Rentable, Room, RoomEntity, Tenant, TimePeriod};
