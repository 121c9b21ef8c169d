/// Cross-video browse view: every video with stored bookmarks, shown when the
/// popup opens on a page that is not a video.
use yew::prelude::*;
use wasm_bindgen::prelude::*;
use web_sys::{HtmlInputElement, HtmlSelectElement};
use patternfly_yew::prelude::*;

use crate::bookmark_data::{SortBy, VideoRecord};
use crate::operations::format_time;

const SORT_OPTIONS: [SortBy; 4] = [
    SortBy::MostRecentlyUpdated,
    SortBy::LeastRecentlyUpdated,
    SortBy::MostBookmarks,
    SortBy::TitleAscending,
];

fn sort_label(sort_by: SortBy) -> &'static str {
    match sort_by {
        SortBy::MostRecentlyUpdated => "Most Recently Updated",
        SortBy::LeastRecentlyUpdated => "Least Recently Updated",
        SortBy::MostBookmarks => "Most Bookmarks",
        SortBy::TitleAscending => "Title (A-Z)",
    }
}

#[derive(Properties, PartialEq)]
pub struct BrowseViewProps {
    pub records: Vec<(String, VideoRecord)>,
    pub sort_by: SortBy,
    pub on_sort_change: Callback<SortBy>,
    pub on_delete_video: Callback<String>,
}

#[function_component(BrowseView)]
pub fn browse_view(props: &BrowseViewProps) -> Html {
    let search_query = use_state(String::new);

    let on_search_input = {
        let search_query = search_query.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                search_query.set(input.value());
            }
        })
    };

    let on_sort_select = {
        let on_sort_change = props.on_sort_change.clone();
        Callback::from(move |e: Event| {
            if let Some(select) = e.target_dyn_into::<HtmlSelectElement>() {
                let selected = SORT_OPTIONS
                    .into_iter()
                    .find(|option| sort_label(*option) == select.value());
                if let Some(sort_by) = selected {
                    on_sort_change.emit(sort_by);
                }
            }
        })
    };

    let query = search_query.to_lowercase();
    let visible: Vec<&(String, VideoRecord)> = props
        .records
        .iter()
        .filter(|(_, record)| query.is_empty() || record.title.to_lowercase().contains(&query))
        .collect();

    html! {
        <div class="browse-view">
            <p class="browse-subtitle">{"This is not a video page. Your bookmarked videos:"}</p>

            <div class="browse-toolbar">
                <input
                    type="text"
                    class="browse-search"
                    placeholder="Search videos..."
                    value={(*search_query).clone()}
                    oninput={on_search_input}
                />
                <select class="browse-sort" onchange={on_sort_select}>
                    {for SORT_OPTIONS.into_iter().map(|option| html! {
                        <option selected={option == props.sort_by}>
                            {sort_label(option)}
                        </option>
                    })}
                </select>
            </div>

            if visible.is_empty() {
                <p class="empty-list">{"No bookmarked videos found."}</p>
            } else {
                <div class="video-list">
                    {for visible.iter().map(|(video_id, record)| {
                        render_video_row(video_id, record, &props.on_delete_video)
                    })}
                </div>
            }
        </div>
    }
}

fn render_video_row(
    video_id: &str,
    record: &VideoRecord,
    on_delete_video: &Callback<String>,
) -> Html {
    let delete = {
        let on_delete_video = on_delete_video.clone();
        let video_id = video_id.to_string();
        Callback::from(move |_: MouseEvent| on_delete_video.emit(video_id.clone()))
    };

    let last_time = record.bookmarks.last().map(|b| b.time).unwrap_or(0.0);

    html! {
        <div class="video-row">
            <img class="video-thumb" src={record.thumbnail_image_src.clone()} />
            <div class="video-row-body">
                <span class="video-title">{&record.title}</span>
                <span class="video-meta">
                    {format!(
                        "{} bookmark{}, up to {}",
                        record.bookmarks.len(),
                        if record.bookmarks.len() == 1 { "" } else { "s" },
                        format_time(last_time),
                    )}
                </span>
                <span class="video-updated">{format_updated(record.updated_at)}</span>
            </div>
            <Button onclick={delete} variant={ButtonVariant::Secondary}>
                {"Delete"}
            </Button>
        </div>
    }
}

fn format_updated(updated_at: f64) -> String {
    let date = js_sys::Date::new(&JsValue::from_f64(updated_at));
    format!(
        "Updated {:04}-{:02}-{:02} {:02}:{:02}",
        date.get_full_year(),
        date.get_month() + 1,
        date.get_date(),
        date.get_hours(),
        date.get_minutes(),
    )
}
