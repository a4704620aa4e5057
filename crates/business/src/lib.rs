//! `kluster-business`: clients, products and invoices owned by business users.
//!
//! Every operation takes the caller as a [`CurrentUser`](kluster_core::CurrentUser)
//! and only touches records owned by that business.

pub mod client;
pub mod clients;
pub mod consumers;
pub mod dto;
pub mod errors;
pub mod invoice;
pub mod invoices;
pub mod product;
pub mod products;
pub mod repository;

pub use client::Client;
pub use clients::ClientService;
pub use consumers::InvoicePaidConsumer;
pub use invoice::{Invoice, InvoiceItem, InvoiceStatus};
pub use invoices::{InvoiceService, parse_status};
pub use product::Product;
pub use products::ProductService;
pub use repository::{
    ClientRepository, InMemoryClientRepository, InMemoryInvoiceRepository, InMemoryProductRepository,
    InvoiceRepository, ProductRepository, RepositoryError,
};
