pub mod v1;
pub mod v2;

/// Wire format selector. Carried explicitly by [crate::Options] and threaded through every
/// encode/decode entry point that does not name a codec version outright. Peers must agree on
/// the format out of band: the two formats are not interchangeable per message and V1 carries
/// no version byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Plain byte stream. Every field is written inline in struct order.
    #[default]
    V1,
    /// Column-compressed stream: info bytes and client identifiers are run-length encoded into
    /// auxiliary sections framed ahead of the primary stream.
    V2,
}
