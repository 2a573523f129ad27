//! Browser demo of a few directives.
use std::cell::Cell;

use anyhow::Context as _;
use wasm_bindgen::prelude::*;
use wdirective::web::prelude::*;

const DEMO_HTML: &str = r#"
<h2>Directives</h2>
<button w-counter="0">clicked 0 times</button>
<button w-copy="Hello from a directive">copy</button>
<span w-tooltip:bottom.once="A tooltip">hover me</span>
<button id="toggle">disconnect</button>
"#;

fn render_count(el: &web_sys::Element, count: u32) {
    el.set_text_content(Some(&format!("clicked {count} times")));
}

fn parse_count(binding: &Binding<Web>) -> anyhow::Result<u32> {
    let value = binding.value.as_deref().unwrap_or("0");
    value
        .parse()
        .with_context(|| format!("{} expects a number, got '{value}'", binding.directive))
}

/// Counts clicks, starting from the attribute value.
pub fn counter() -> Directive<Web> {
    Directive::<Web>::new()
        .on_mounted(|el, binding| {
            let count = singleton(el, "count", || Cell::new(0u32));
            count.set(parse_count(binding)?);
            render_count(el, count.get());

            let target = el.clone();
            use_event_listener::<Web>(
                el,
                "click",
                move |_| {
                    count.set(count.get() + 1);
                    render_count(&target, count.get());
                },
                ListenerOptions::default(),
            )?;
            Ok(())
        })
        .on_updated(|el, binding| {
            if let Some(count) = get_singleton::<_, Cell<u32>>(el, "count") {
                count.set(parse_count(binding)?);
                render_count(el, count.get());
            }
            Ok(())
        })
        .on_unmounted(|el, _| {
            delete_singleton(el, "count");
            Ok(())
        })
}

/// Shows the attribute value while hovering. The argument picks the
/// placement, `.once` shows it only the first time.
pub fn tooltip() -> Directive<Web> {
    Directive::<Web>::new()
        .on_mounted(|el, binding| {
            let placement = binding.argument.as_deref().unwrap_or("top");
            let tip = document()
                .create_element("span")
                .map_err(wdirective::Error::from)?;
            tip.set_class_name(&format!("tooltip tooltip-{placement}"));
            tip.set_text_content(binding.value.as_deref());
            tip.set_attribute("hidden", "")
                .map_err(wdirective::Error::from)?;
            el.append_child(&tip).map_err(wdirective::Error::from)?;

            let show = {
                let tip = tip.clone();
                move |_: &web_sys::Event| {
                    let _ = tip.remove_attribute("hidden");
                }
            };
            let hide = {
                let tip = tip.clone();
                move |_: &web_sys::Event| {
                    let _ = tip.set_attribute("hidden", "");
                }
            };
            let options = ListenerOptions {
                once: binding.modifiers.has("once"),
                ..Default::default()
            };
            use_event_listener::<Web>(el, "mouseenter", show, options)?;
            use_event_listener::<Web>(el, "mouseleave", hide, ListenerOptions::default())?;
            singleton(el, "tooltip", move || tip);
            Ok(())
        })
        .on_updated(|el, binding| {
            if let Some(tip) = get_singleton::<_, web_sys::Element>(el, "tooltip") {
                tip.set_text_content(binding.value.as_deref());
            }
            Ok(())
        })
        .on_unmounted(|el, _| {
            if let Some(tip) = get_singleton::<_, web_sys::Element>(el, "tooltip") {
                tip.remove();
            }
            delete_singleton(el, "tooltip");
            Ok(())
        })
}

fn write_clipboard(text: &str) -> Result<(), wdirective::Error> {
    let navigator = window().navigator();
    let clipboard = js_sys::Reflect::get(&navigator, &"clipboard".into())?;
    let write_text = js_sys::Reflect::get(&clipboard, &"writeText".into())?
        .dyn_into::<js_sys::Function>()
        .map_err(wdirective::Error::from)?;
    let promise = write_text
        .call1(&clipboard, &text.into())?
        .dyn_into::<js_sys::Promise>()
        .map_err(wdirective::Error::from)?;
    wasm_bindgen_futures::spawn_local(async move {
        match wasm_bindgen_futures::JsFuture::from(promise).await {
            Ok(_) => log::info!("copied to the clipboard"),
            Err(e) => log::error!("could not copy: {e:?}"),
        }
    });
    Ok(())
}

/// Copies the attribute value to the clipboard on click.
pub fn copy() -> Directive<Web> {
    Directive::<Web>::new().on_mounted(|el, binding| {
        let target = el.clone();
        let raw = binding.directive.clone();
        use_event_listener::<Web>(
            el,
            "click",
            move |_| {
                let Some(text) = target.get_attribute(&raw) else {
                    return;
                };
                if let Err(e) = write_clipboard(&text) {
                    log::error!("{e}");
                }
            },
            ListenerOptions::default(),
        )?;
        Ok(())
    })
}

fn to_js(e: wdirective::Error) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen(start)]
fn web_run() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    let wrapper = document().create_element("div")?;
    wrapper.set_inner_html(DEMO_HTML);
    body().append_child(&wrapper)?;

    let directives = Directives::<Web>::new(Options::default().with_attr_params(true));
    directives.register("counter", counter());
    directives.register("tooltip", tooltip());
    directives.register("copy", copy());
    directives.listen(Some(&wrapper)).map_err(to_js)?;

    let toggle = wrapper
        .query_selector("#toggle")?
        .ok_or_else(|| JsValue::from_str("missing #toggle"))?;
    let clicks = EventListener::new(&toggle, "click").map_err(to_js)?;
    wasm_bindgen_futures::spawn_local(async move {
        loop {
            let _ev = clicks.next().await;
            if directives.is_listening() {
                directives.disconnect();
                toggle.set_text_content(Some("listen"));
            } else if let Err(e) = directives.listen(Some(&wrapper)) {
                log::error!("{e}");
            } else {
                toggle.set_text_content(Some("disconnect"));
            }
        }
    });
    Ok(())
}
