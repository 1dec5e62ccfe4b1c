pub(crate) mod migrate;
