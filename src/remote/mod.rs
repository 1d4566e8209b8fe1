//! Remote shipping of error entries to a log aggregation service.

pub mod client;
pub mod locale;
pub mod message;
pub mod reason;
pub mod shipper;

pub use client::{
    ClientConfig, ClientError, DeliveryStats, LogglyClient, LogglyClientFactory, RemoteClient,
    RemoteClientFactory, RemoteSettings,
};
pub use locale::GeoLookup;
pub use message::{Extra, RemoteMessage};
pub use reason::{Reason, extract, extract_with};
pub use shipper::{RemoteShipper, RemoteShipperConfig};
