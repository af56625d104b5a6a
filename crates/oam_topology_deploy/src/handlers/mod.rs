pub mod deploy;
pub mod destroy;
pub mod report;
#[cfg(test)]
pub(crate) mod test_support;
