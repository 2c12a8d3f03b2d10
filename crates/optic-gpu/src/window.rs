/// The window system, treated as an opaque collaborator: given a native
/// window reference, report its live client-area size and visibility.
pub trait NativeWindow {
    /// Current client-area size in pixels. A minimized window reports a
    /// zero dimension.
    fn client_size(&self) -> (u32, u32);

    fn is_visible(&self) -> bool;
}
