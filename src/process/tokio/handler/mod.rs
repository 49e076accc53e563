pub(crate) mod output;
pub(crate) mod result;
pub(crate) mod terminate;
pub(crate) mod wait;
