pub mod aliases {
    pub type MaybeOwnedString = ::std::borrow::Cow<'static, str>;
    pub type MaybeOwnedPath = ::std::borrow::Cow<'static, ::std::path::Path>;
    pub type MaybeOwnedVec<T> = ::std::borrow::Cow<'static, [T]>;
}
