use serde_json::json;
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

use nightglow::common::logger::Log;
use nightglow::config::Config;
use nightglow::core::period::Period;
use nightglow::overlay::testing::RecordingSurface;
use nightglow::overlay::{MountPoint, PageEvent, kelvin_to_rgb};
use nightglow::popup::Selection;
use nightglow::store::{Key, StorageArea, Store};
use nightglow::time::ManualClock;
use nightglow::{Nightglow, Running};

// Long enough for any automatic transition to settle
const SETTLE: Duration = Duration::from_secs(6);

async fn start_at(hour: u32, minute: u32) -> Running {
    Log::set_enabled(false);
    Nightglow::new(Store::memory(StorageArea::Local), Config::default())
        .with_clock(ManualClock::ticking_at(hour, minute))
        .start()
        .await
        .unwrap()
}

async fn current_temp(running: &Running) -> Option<u32> {
    running
        .store()
        .get(&[Key::CurrentTemp])
        .await
        .unwrap()
        .u32(Key::CurrentTemp)
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_startup_resolves_and_tints_pages() {
    let mut running = start_at(12, 0).await;
    let surface = RecordingSurface::new("example.com");
    running.open_page(surface.clone());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(current_temp(&running).await, Some(6500));
    assert_eq!(surface.current_color(), Some(kelvin_to_rgb(6500)));
    assert_eq!(surface.created_count(), 1);

    running.shutdown().await;
    assert!(surface.current().is_none());
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_period_boundary_reaches_every_page() {
    let mut running = start_at(17, 59).await;
    let first = RecordingSurface::new("example.com");
    let second = RecordingSurface::new("docs.rs");
    running.open_page(first.clone());
    running.open_page(second.clone());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(first.current_color(), Some(kelvin_to_rgb(6500)));

    // Minute rollover at 18:00 switches to Sunset
    tokio::time::sleep(Duration::from_secs(30) + SETTLE).await;
    assert_eq!(current_temp(&running).await, Some(4200));
    assert_eq!(first.current_color(), Some(kelvin_to_rgb(4200)));
    assert_eq!(second.current_color(), Some(kelvin_to_rgb(4200)));
    assert_eq!(running.popup().status().await.period, Period::Sunset);

    running.shutdown().await;
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_preview_round_trip() {
    let mut running = start_at(12, 0).await;
    let surface = RecordingSurface::new("example.com");
    running.open_page(surface.clone());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let selection = running.popup().select_period(Period::Bedtime).await;
    assert!(matches!(
        selection,
        Selection::Previewing {
            period: Period::Bedtime,
            temperature: 2700,
            ..
        }
    ));

    // Preview speed, well before the popup leaves preview
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(surface.current_color(), Some(kelvin_to_rgb(2700)));
    assert_eq!(current_temp(&running).await, Some(2700));
    let status = running.popup().status().await;
    assert_eq!(status.previewing, Some(Period::Bedtime));
    assert_eq!(status.forced.map(|(temperature, _)| temperature), Some(2700));

    // The popup exits at 5 s; the direct message corrects pages at preview
    // speed instead of waiting for the slow automatic transition
    running.popup().preview_ended().await;
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(surface.current_color(), Some(kelvin_to_rgb(6500)));

    tokio::time::sleep(SETTLE).await;
    assert!(running.store().get(&Key::OVERRIDE).await.unwrap().is_empty());
    assert_eq!(current_temp(&running).await, Some(6500));
    assert_eq!(surface.current_color(), Some(kelvin_to_rgb(6500)));
    assert!(!running.resolver().expiry_pending());

    running.shutdown().await;
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_disable_removes_overlays_and_keeps_current() {
    let mut running = start_at(12, 0).await;
    let surface = RecordingSurface::new("example.com");
    running.open_page(surface.clone());
    tokio::time::sleep(Duration::from_millis(100)).await;

    running.popup().set_enabled(false).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(surface.current().is_none());
    assert_eq!(current_temp(&running).await, Some(6500));

    // Overlays stay removed while disabled, even for live changes
    running.popup().set_temperature(Period::Daytime, 5000).await;
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(surface.current().is_none());

    running.popup().set_enabled(true).await;
    tokio::time::sleep(SETTLE).await;
    assert_eq!(surface.current_color(), Some(kelvin_to_rgb(5000)));
    assert_eq!(surface.created_count(), 2);

    running.shutdown().await;
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_excluded_site_only_affects_its_pages() {
    let mut running = start_at(12, 0).await;
    let excluded = RecordingSurface::new("example.com");
    let tinted = RecordingSurface::new("docs.rs");
    running.open_page(excluded.clone());
    running.open_page(tinted.clone());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(running.popup().toggle_site("Example.com").await.unwrap());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(excluded.current().is_none());
    assert_eq!(tinted.current_color(), Some(kelvin_to_rgb(6500)));

    // Previews skip excluded sites too
    running.popup().select_period(Period::Sunset).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(excluded.current().is_none());
    assert_eq!(excluded.created_count(), 1);
    assert_eq!(tinted.current_color(), Some(kelvin_to_rgb(4200)));

    running.shutdown().await;
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_instant_flag_is_consumed_by_one_page() {
    let mut running = start_at(12, 0).await;
    let pages: Vec<Arc<RecordingSurface>> = ["a.example", "b.example", "c.example"]
        .into_iter()
        .map(RecordingSurface::new)
        .collect();
    for page in &pages {
        running.open_page(page.clone());
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    running.popup().set_temperature(Period::Daytime, 5000).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let target = Some(kelvin_to_rgb(5000));
    let instant = pages
        .iter()
        .filter(|page| page.current_color() == target)
        .count();
    assert_eq!(instant, 1);
    assert_ne!(
        running
            .store()
            .get(&[Key::InstantApplyOnce])
            .await
            .unwrap()
            .bool(Key::InstantApplyOnce),
        Some(true)
    );

    // The others still converge with the automatic transition
    tokio::time::sleep(SETTLE).await;
    assert!(pages.iter().all(|page| page.current_color() == target));

    running.shutdown().await;
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_page_lifecycle_events() {
    let mut running = start_at(23, 0).await;
    let surface = RecordingSurface::new("video.example");
    let id = running.open_page(surface.clone());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(surface.current_color(), Some(kelvin_to_rgb(2700)));

    surface.set_mount_point(Some(MountPoint::Fullscreen("player".to_string())));
    assert!(running.page_event(id, PageEvent::FullscreenChanged));
    tokio::time::sleep(Duration::from_millis(10)).await;
    let overlay = surface.current().unwrap();
    assert_eq!(
        surface.mount_of(overlay),
        Some(MountPoint::Fullscreen("player".to_string()))
    );
    assert_eq!(surface.color_of(overlay), Some(kelvin_to_rgb(2700)));

    running.close_page(id).await;
    assert!(surface.current().is_none());
    assert!(!running.page_event(id, PageEvent::FullscreenChanged));
    assert_eq!(running.messenger().page_count(), 0);
    assert!(running.page_ids().is_empty());

    running.shutdown().await;
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_file_store_persists_and_reloads_external_writes() {
    Log::set_enabled(false);
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");

    let config: Config = toml::from_str("bedtime_temp = 2200\n").unwrap();
    let mut running = Nightglow::new(Store::open_file(&path).unwrap(), config)
        .with_clock(ManualClock::ticking_at(23, 30))
        .start()
        .await
        .unwrap();
    let surface = RecordingSurface::new("example.com");
    running.open_page(surface.clone());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(surface.current_color(), Some(kelvin_to_rgb(2200)));

    // Another process sees the persisted record
    let other = Store::open_file(&path).unwrap();
    let snapshot = other.get_all().await.unwrap();
    assert_eq!(snapshot.u32(Key::BedtimeTemp), Some(2200));
    assert_eq!(snapshot.u32(Key::CurrentTemp), Some(2200));
    assert_eq!(snapshot.bool(Key::Enabled), Some(true));

    // ...and its writes reach this instance once the file is re-read
    other
        .set([(Key::ExcludedHostnames, json!(["example.com"]))])
        .await
        .unwrap();
    assert_eq!(running.store().reload_from_disk().unwrap(), 1);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(surface.current().is_none());

    running.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_store_watcher_picks_up_other_processes() {
    Log::set_enabled(false);
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");

    let running = Nightglow::new(Store::open_file(&path).unwrap(), Config::default())
        .watch_store()
        .start()
        .await
        .unwrap();
    // Let the startup resolution land in the file first
    tokio::time::sleep(Duration::from_millis(300)).await;

    let other = Store::open_file(&path).unwrap();
    other.set([(Key::SunsetTemp, json!(3100))]).await.unwrap();

    let mut seen = None;
    for _ in 0..100 {
        seen = running
            .store()
            .get(&[Key::SunsetTemp])
            .await
            .unwrap()
            .u32(Key::SunsetTemp);
        if seen == Some(3100) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(seen, Some(3100));

    running.shutdown().await;
}
