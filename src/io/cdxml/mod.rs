//! ChemDraw XML (`.cdxml`) drawings.
//!
//! Only the connection table of each outer fragment is read: node positions, elements, charges,
//! isotopes, attachment labels (`#name`), bond orders, wedge/hash display markers, and bold or
//! hashed bonds as depth hints. Styling, text runs other than captions, and nested
//! abbreviation fragments are skipped.

pub mod reader;
