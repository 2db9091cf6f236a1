pub(crate) mod conj;
