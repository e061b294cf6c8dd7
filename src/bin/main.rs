mod config;
mod map;

use crate::config::CONFIG;
use locator::*;
use map::ConsoleMap;
use std::io::{BufRead, Write};
use std::time::{Duration, Instant};

type Panel = LocatorPanel<ConsoleMap, HttpGeocoder>;

fn main() {
    log::set_max_level(CONFIG.general.log_level.to_level_filter());
    pretty_env_logger::init();

    let api_key = CONFIG
        .geocoder
        .api_key
        .clone()
        .expect("A geocoder API key is required. Set geocoder.api_key in config/local.toml.");

    let center = LatLng::new(CONFIG.map.center.lat, CONFIG.map.center.lng);
    let map = ConsoleMap::new(center, CONFIG.map.zoom);
    let geocoder = HttpGeocoder::new(&CONFIG.geocoder.endpoint[..], api_key);

    let mut panel = Panel::new(PanelOptions {
        banner_on_reverse_failure: CONFIG.geocoder.banner_on_reverse_failure,
    });
    // The widget finished "loading": hand over the map and its geocoder.
    panel.on_ready(map, geocoder);

    println!("pinpoint location panel. Type `help` for commands.");
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let mut words = line.split_whitespace();
        match words.next() {
            Some("xy") => {
                let lat = words.next().unwrap_or("").to_string();
                let lng = words.next().unwrap_or("").to_string();
                panel.set_field(Field::Lat, &lat);
                panel.set_field(Field::Lng, &lng);
                panel.locate_by_coordinates(&lat, &lng);
                settle(&mut panel);
                show(&panel);
            }
            Some("addr") => {
                let address = words.collect::<Vec<_>>().join(" ");
                panel.set_field(Field::Address, &address);
                panel.locate_by_address(&address);
                settle(&mut panel);
                show(&panel);
            }
            Some("pan") => {
                let lat = words.next().and_then(parse_coordinate);
                let lng = words.next().and_then(parse_coordinate);
                match (lat, lng) {
                    (Some(lat), Some(lng)) => {
                        if let Some(map) = panel.map_mut() {
                            map.pan_to(LatLng::new(lat, lng));
                        }
                        panel.on_bounds_changed();
                        settle(&mut panel);
                        show(&panel);
                    }
                    _ => println!("usage: pan <lat> <lng>"),
                }
            }
            Some("dismiss") => panel.dismiss_banner(),
            Some("show") => show(&panel),
            Some("help") => help(),
            Some("quit") | Some("exit") => break,
            Some(other) => println!("unknown command `{}`, try `help`", other),
            None => {}
        }
    }
}

/// Pump replies until the in-flight lookup resolved or the wait runs out.
fn settle(panel: &mut Panel) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while panel.has_pending() && Instant::now() < deadline {
        panel.process_replies();
        std::thread::sleep(Duration::from_millis(25));
    }
    panel.process_replies();
    if panel.has_pending() {
        log::warn!("Geocode lookup did not complete in time.");
    }
}

fn show(panel: &Panel) {
    if panel.banner().visible {
        println!("!! {}", panel.banner().message);
    }
    let position = panel.position();
    println!("lat:     {}", position.lat);
    println!("lng:     {}", position.lng);
    println!("address: {}", position.address);
    if let Some(map) = panel.map() {
        println!("map:     center {} zoom {}", map.center(), map.zoom());
        for (id, position) in map.markers() {
            println!("         {} at {}", id, position);
        }
    }
}

fn help() {
    println!("xy <lat> <lng>   look up the address at the coordinates");
    println!("addr <text>      look up the coordinates of an address");
    println!("pan <lat> <lng>  simulate panning the map");
    println!("dismiss          hide the error banner");
    println!("show             print the panel state");
    println!("quit             leave");
}
