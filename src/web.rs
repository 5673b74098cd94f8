// web.rs - Mount the backdrop on a page canvas
//
// Owns the requestAnimationFrame loop and the window listeners. Every
// rendered frame is blitted into the canvas with putImageData; the canvas
// backing store matches the simulation size and CSS stretches it.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::{Clamped, JsCast};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, ImageData, MouseEvent, Window};

use crate::error::FluidError;
use crate::js_error;
use crate::session::RenderSession;

/// Canvas colour shown when the effect can't run
const CANVAS_INACTIVE_COLOR: &str = "#8EFEFE";

type RafClosure = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

struct Mount {
    session: RenderSession,
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    running: bool,
}

impl Mount {
    fn sync_canvas_size(&self) {
        self.canvas.set_width(self.session.width());
        self.canvas.set_height(self.session.height());
    }

    fn blit(&self) -> Result<(), JsValue> {
        let image = ImageData::new_with_u8_clamped_array_and_sh(
            Clamped(self.session.pixels()),
            self.session.width(),
            self.session.height(),
        )?;
        self.ctx.put_image_data(&image, 0.0, 0.0)
    }
}

/// Start the fluid backdrop on the canvas with id `canvas_id`.
///
/// On failure the canvas is painted a flat colour and the error returned;
/// the rest of the page is unaffected.
#[wasm_bindgen]
pub fn mount(canvas_id: &str) -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();

    let window = web_sys::window().ok_or(FluidError::ContextUnavailable).map_err(js_error)?;
    let canvas = find_canvas(&window, canvas_id).map_err(js_error)?;

    match start(&window, canvas.clone()) {
        Ok(()) => Ok(()),
        Err(e) => {
            log::warn!("fluid backdrop disabled: {e:?}");
            canvas.style().set_property("background-color", CANVAS_INACTIVE_COLOR).ok();
            Err(e)
        }
    }
}

fn find_canvas(window: &Window, id: &str) -> Result<HtmlCanvasElement, FluidError> {
    window
        .document()
        .and_then(|doc| doc.get_element_by_id(id))
        .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok())
        .ok_or_else(|| FluidError::CanvasNotFound(id.to_string()))
}

fn now(window: &Window) -> f64 {
    window.performance().map_or(0.0, |p| p.now())
}

fn start(window: &Window, canvas: HtmlCanvasElement) -> Result<(), JsValue> {
    let ctx = canvas
        .get_context("2d")?
        .and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
        .ok_or(FluidError::ContextUnavailable)
        .map_err(js_error)?;

    let rect = canvas.get_bounding_client_rect();
    let session = RenderSession::new(rect.width() as f32, rect.height() as f32, now(window))
        .map_err(js_error)?;

    let mount = Mount { session, canvas, ctx, running: false };
    mount.sync_canvas_size();
    let mount = Rc::new(RefCell::new(mount));

    let frame = frame_loop(mount.clone());
    listen(window, mount.clone(), frame.clone())?;

    mount.borrow_mut().running = true;
    request_frame(window, &frame)
}

fn request_frame(window: &Window, frame: &RafClosure) -> Result<(), JsValue> {
    let frame = frame.borrow();
    let Some(cb) = frame.as_ref() else {
        return Ok(());
    };
    window.request_animation_frame(cb.as_ref().unchecked_ref())?;
    Ok(())
}

/// Build the rAF callback once; it re-registers itself while focused
fn frame_loop(mount: Rc<RefCell<Mount>>) -> RafClosure {
    let closure: RafClosure = Rc::new(RefCell::new(None));
    let next = closure.clone();

    *closure.borrow_mut() = Some(Closure::wrap(Box::new(move |timestamp: f64| {
        let Some(window) = web_sys::window() else { return };

        // Busy means some other callback holds the session; try next frame
        let keep_running = match mount.try_borrow_mut() {
            Ok(mut m) => {
                let tick = m.session.tick(timestamp);
                if tick.rendered() {
                    if let Err(e) = m.blit() {
                        log::error!("blit failed: {e:?}");
                    }
                }
                m.running = tick.keep_running();
                m.running
            }
            Err(_) => true,
        };

        if keep_running {
            if let Err(e) = request_frame(&window, &next) {
                log::error!("requestAnimationFrame failed: {e:?}");
            }
        }
    }) as Box<dyn FnMut(f64)>));

    closure
}

fn listen(window: &Window, mount: Rc<RefCell<Mount>>, frame: RafClosure) -> Result<(), JsValue> {
    // Focus restarts the loop from a fresh clock anchor
    {
        let mount = mount.clone();
        let on_focus = Closure::wrap(Box::new(move || {
            let Some(window) = web_sys::window() else { return };
            let Ok(mut m) = mount.try_borrow_mut() else { return };
            if m.session.focus(now(&window)) && !m.running {
                m.running = true;
                drop(m);
                if let Err(e) = request_frame(&window, &frame) {
                    log::error!("requestAnimationFrame failed: {e:?}");
                }
            }
        }) as Box<dyn FnMut()>);
        window.add_event_listener_with_callback("focus", on_focus.as_ref().unchecked_ref())?;
        on_focus.forget();
    }

    // Blur lets the loop run dry
    {
        let mount = mount.clone();
        let on_blur = Closure::wrap(Box::new(move || {
            if let Ok(mut m) = mount.try_borrow_mut() {
                m.session.blur();
            }
        }) as Box<dyn FnMut()>);
        window.add_event_listener_with_callback("blur", on_blur.as_ref().unchecked_ref())?;
        on_blur.forget();
    }

    // Pointer anywhere on the page, relative to the canvas
    {
        let mount = mount.clone();
        let on_move = Closure::wrap(Box::new(move |event: MouseEvent| {
            let Ok(mut m) = mount.try_borrow_mut() else { return };
            let rect = m.canvas.get_bounding_client_rect();
            let x = event.client_x() as f64 - rect.x();
            let y = event.client_y() as f64 - rect.y();
            m.session.pointer_move(x as f32, y as f32);
        }) as Box<dyn FnMut(MouseEvent)>);
        if let Some(root) = window.document().and_then(|d| d.document_element()) {
            root.add_event_listener_with_callback("mousemove", on_move.as_ref().unchecked_ref())?;
        }
        on_move.forget();
    }

    // Window resize may move the canvas into a new size bucket
    {
        let on_resize = Closure::wrap(Box::new(move || {
            let Ok(mut m) = mount.try_borrow_mut() else { return };
            let rect = m.canvas.get_bounding_client_rect();
            match m.session.resize(rect.width() as f32, rect.height() as f32) {
                Ok(true) => m.sync_canvas_size(),
                Ok(false) => {}
                Err(e) => log::error!("resize failed: {e}"),
            }
        }) as Box<dyn FnMut()>);
        window.add_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref())?;
        on_resize.forget();
    }

    Ok(())
}
