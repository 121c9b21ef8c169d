/// Popup views: the current-video bookmark list and the cross-video browser.
pub mod browse;
pub mod popup;
