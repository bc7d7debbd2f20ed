use super::*;
use crate::params::Rule;

fn rendered(event: &Event) -> Vec<String> {
    event.parameters().iter().map(|p| p.to_string()).collect()
}

fn app() -> AppInfo {
    AppInfo {
        name: "Demo App".into(),
        identifier: "com.example.demo".into(),
        version: "1.0".into(),
        build: "7".into(),
    }
}

#[test]
fn screen_view_required_parameters() {
    let event = Event::screen_view(&app(), "Settings", "Settings", &[]).unwrap();
    assert_eq!(
        rendered(&event),
        vec![
            "t=screenview",
            "an=Demo%20App",
            "av=1.0",
            "aid=com.example.demo",
            "dp=/Settings",
            "dt=Settings",
        ]
    );
    assert_eq!(event.hit_type(), Some("screenview"));
}

#[test]
fn page_view_required_parameters() {
    let event = Event::page_view("com.example.demo", "Home", "Welcome", &[]).unwrap();
    assert_eq!(
        rendered(&event),
        vec!["t=pageview", "dh=com.example.demo", "dp=/Home", "dt=Welcome"]
    );
}

#[test]
fn session_start_and_end() {
    let start = Event::session(SessionControl::Start, "com.example.demo", &[]).unwrap();
    let end = Event::session(SessionControl::End, "com.example.demo", &[]).unwrap();
    assert_eq!(rendered(&start), vec!["sc=start", "dl=com.example.demo"]);
    assert_eq!(end.get("sc"), Some("end"));
    assert_eq!(start.hit_type(), None, "session hits carry no hit type");
}

#[test]
fn custom_event_defaults_to_universal_category() {
    let event = Event::custom(&CustomEvent::new("tap"), &[]).unwrap();
    assert_eq!(rendered(&event), vec!["t=event", "ec=universal", "ea=tap"]);
}

#[test]
fn custom_event_with_label_and_value() {
    let fields = CustomEvent::new("purchase")
        .category("checkout")
        .label("basket")
        .value(3);
    let event = Event::custom(&fields, &[]).unwrap();
    assert_eq!(
        rendered(&event),
        vec!["t=event", "ec=checkout", "ea=purchase", "el=basket", "ev=3"]
    );
}

#[test]
fn custom_event_rejects_empty_action() {
    let err = Event::custom(&CustomEvent::new(""), &[]).unwrap_err();
    assert_eq!(err.key, "ea");
    assert_eq!(err.rule, Rule::NotEmpty);
}

#[test]
fn exception_fatal_flag() {
    let fatal = Event::exception("boom", true, &[]).unwrap();
    let non_fatal = Event::exception("oops", false, &[]).unwrap();
    assert_eq!(rendered(&fatal), vec!["t=exception", "exd=boom", "exf=1"]);
    assert_eq!(non_fatal.get("exf"), Some("0"));
}

#[test]
fn exception_description_over_limit_fails_at_construction() {
    let err = Event::exception(&"x".repeat(151), true, &[]).unwrap_err();
    assert_eq!(err.key, "exd");
    assert_eq!(err.rule, Rule::MaxBytes(150));
}

#[test]
fn extra_parameters_are_appended() {
    let extra = vec![vocab::non_interaction(true), vocab::user_id("u-1")];
    let event = Event::exception("boom", false, &extra).unwrap();
    assert_eq!(
        rendered(&event),
        vec!["t=exception", "exd=boom", "exf=0", "ni=1", "uid=u-1"]
    );
}

#[test]
fn extra_duplicate_of_required_pair_is_dropped() {
    let extra = vec![vocab::hit_type(HitType::Event)];
    let event = Event::custom(&CustomEvent::new("tap"), &extra).unwrap();
    assert_eq!(event.parameters().len(), 3);
}

#[test]
fn extra_with_same_key_different_value_is_kept() {
    let extra = vec![vocab::hit_type(HitType::ScreenView)];
    let event = Event::custom(&CustomEvent::new("tap"), &extra).unwrap();
    assert_eq!(
        rendered(&event),
        vec!["t=event", "ec=universal", "ea=tap", "t=screenview"]
    );
    assert_eq!(event.hit_type(), Some("event"), "first value wins on lookup");
}
