pub mod link;
pub mod locus;
pub mod strand;
pub mod tss;

// re-export for cleaner imports
pub use self::link::{CorrelationSign, RegulatoryLink};
pub use self::locus::Locus;
pub use self::strand::Strand;
pub use self::tss::{Tss, TssAnnotation};
