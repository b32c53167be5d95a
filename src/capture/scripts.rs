//! In-page scripts used by the snapshotter.
//!
//! Every script is a self-invoking function that returns `JSON.stringify(...)`
//! output: either the step's report or `{ "error": "..." }`. Arguments are
//! injected as a JSON literal in place of `{{ARGS}}`.

use crate::Result;
use serde::Serialize;

const ARGS_TOKEN: &str = "{{ARGS}}";

/// Substitute the serialized `args` into `template`.
pub fn render<A: Serialize>(template: &str, args: &A) -> Result<String> {
    let json = serde_json::to_string(args)?;
    Ok(template.replace(ARGS_TOKEN, &json))
}

/// Clone `selector` into an off-screen container and report the computed
/// styles of the original's descendants.
pub const MOUNT: &str = r#"(function(){
    try {
        const args = {{ARGS}};
        const source = document.querySelector(args.selector);
        if (!source) return JSON.stringify({ error: 'no element matches ' + args.selector });

        const body = document.body;
        const docHeight = Math.max(
            document.documentElement ? document.documentElement.scrollHeight : 0,
            body ? body.scrollHeight : 0
        );

        const container = document.createElement('div');
        container.id = args.containerId;
        const s = container.style;
        s.position = 'absolute';
        s.left = '0px';
        s.top = (docHeight + 200) + 'px';
        s.width = args.width + 'px';
        s.backgroundColor = '#ffffff';
        s.padding = '0';
        s.margin = '0';
        s.overflow = 'visible';
        body.appendChild(container);

        const clone = source.cloneNode(true);
        const cs = clone.style;
        cs.width = args.width + 'px';
        cs.boxSizing = 'border-box';
        cs.transform = 'scale(1)';
        cs.transformOrigin = 'top left';
        cs.zoom = '1';
        cs.position = 'relative';
        cs.overflow = 'visible';
        if (args.height) {
            cs.height = args.height + 'px';
        } else {
            cs.minHeight = 'fit-content';
            cs.paddingTop = args.paddingTop + 'px';
            cs.paddingBottom = args.paddingBottom + 'px';
        }
        container.appendChild(clone);
        void container.offsetHeight;

        const nodes = [];
        source.querySelectorAll('*').forEach(function(el){
            const computed = window.getComputedStyle(el);
            const props = {};
            args.props.forEach(function(p){
                const v = computed.getPropertyValue(p);
                if (v) props[p] = v;
            });
            const tag = el.tagName.toLowerCase();
            let svg = null;
            if (tag === 'svg') {
                let bbox = null;
                try { const b = el.getBBox(); bbox = [b.width, b.height]; } catch (e) {}
                svg = { bbox: bbox, hasWidth: el.hasAttribute('width'), hasHeight: el.hasAttribute('height') };
            }
            nodes.push({ tag: tag, props: props, svg: svg });
        });

        return JSON.stringify({
            nodes: nodes,
            svgCount: clone.querySelectorAll('svg').length,
            canvasCount: clone.querySelectorAll('canvas').length
        });
    } catch (e) {
        return JSON.stringify({ error: String(e) });
    }
})()"#;

/// Apply a freeze plan to the clone's descendants, one node at a time.
pub const APPLY: &str = r#"(function(){
    try {
        const args = {{ARGS}};
        const container = document.getElementById(args.containerId);
        if (!container || !container.firstElementChild) return JSON.stringify({ error: 'snapshot container missing' });
        const nodes = container.firstElementChild.querySelectorAll('*');
        let applied = 0, failed = 0;
        args.patches.forEach(function(patch){
            const el = nodes[patch.index];
            if (!el) { failed++; return; }
            let ok = true;
            patch.styles.forEach(function(d){
                try { el.style.setProperty(d.name, d.value, d.important ? 'important' : ''); } catch (e) { ok = false; }
            });
            patch.attrs.forEach(function(a){
                try { if (!el.getAttribute(a.name)) el.setAttribute(a.name, a.value); } catch (e) { ok = false; }
            });
            if (ok) { applied++; } else { failed++; }
        });
        return JSON.stringify({ applied: applied, failed: failed });
    } catch (e) {
        return JSON.stringify({ error: String(e) });
    }
})()"#;

/// Backfill svg width/height attributes from their laid-out size.
pub const SIZE_SVGS: &str = r#"(function(){
    try {
        const args = {{ARGS}};
        const container = document.getElementById(args.containerId);
        if (!container) return JSON.stringify({ error: 'snapshot container missing' });
        let sized = 0;
        container.querySelectorAll('svg').forEach(function(svg){
            svg.getBoundingClientRect();
            const style = window.getComputedStyle(svg);
            if (!svg.getAttribute('width')) {
                const w = parseFloat(style.width);
                if (w > 0) { svg.setAttribute('width', String(w)); sized++; }
            }
            if (!svg.getAttribute('height')) {
                const h = parseFloat(style.height);
                if (h > 0) { svg.setAttribute('height', String(h)); sized++; }
            }
        });
        return JSON.stringify({ sized: sized });
    } catch (e) {
        return JSON.stringify({ error: String(e) });
    }
})()"#;

/// Resolve once webfonts have loaded. Awaited.
pub const FONTS_READY: &str = r#"(async function(){
    try {
        if (document.fonts && document.fonts.ready && typeof document.fonts.ready.then === 'function') {
            await document.fonts.ready;
            return JSON.stringify({ ready: true });
        }
        return JSON.stringify({ ready: false });
    } catch (e) {
        return JSON.stringify({ error: String(e) });
    }
})()"#;

/// Copy canvas bitmaps from the original into the clone. Awaited.
///
/// Cloning a canvas copies the element but not its pixels.
pub const COPY_CANVASES: &str = r#"(async function(){
    try {
        const args = {{ARGS}};
        const source = document.querySelector(args.selector);
        const container = document.getElementById(args.containerId);
        if (!source || !container) return JSON.stringify({ error: 'snapshot source or container missing' });
        const originals = source.querySelectorAll('canvas');
        const clones = container.querySelectorAll('canvas');
        let copied = 0, failed = 0;
        for (let i = 0; i < originals.length; i++) {
            const orig = originals[i];
            const copy = clones[i];
            if (!copy) continue;
            try {
                copy.width = orig.width;
                copy.height = orig.height;
                const rect = orig.getBoundingClientRect();
                copy.style.width = rect.width + 'px';
                copy.style.height = rect.height + 'px';
                const ctx = copy.getContext('2d');
                if (!ctx) { failed++; continue; }
                ctx.clearRect(0, 0, copy.width, copy.height);
                try {
                    const dataUrl = orig.toDataURL('image/png');
                    await new Promise(function(resolve, reject){
                        const img = new Image();
                        img.onload = function(){ try { ctx.drawImage(img, 0, 0); resolve(); } catch (e) { reject(e); } };
                        img.onerror = function(){ reject(new Error('image load failed')); };
                        img.src = dataUrl;
                    });
                } catch (e) {
                    ctx.drawImage(orig, 0, 0);
                }
                copied++;
            } catch (e) {
                failed++;
            }
        }
        return JSON.stringify({ copied: copied, failed: failed });
    } catch (e) {
        return JSON.stringify({ error: String(e) });
    }
})()"#;

/// Document-space bounding box of the snapshot container.
pub const MEASURE: &str = r#"(function(){
    try {
        const args = {{ARGS}};
        const container = document.getElementById(args.containerId);
        if (!container) return JSON.stringify({ error: 'snapshot container missing' });
        const r = container.getBoundingClientRect();
        return JSON.stringify({
            x: r.left + window.scrollX,
            y: r.top + window.scrollY,
            width: r.width,
            height: r.height
        });
    } catch (e) {
        return JSON.stringify({ error: String(e) });
    }
})()"#;

/// Remove an element by id if it is still attached.
pub const REMOVE: &str = r#"(function(){
    try {
        const args = {{ARGS}};
        const el = document.getElementById(args.containerId);
        if (el && el.parentNode) el.parentNode.removeChild(el);
        return JSON.stringify({ removed: !!el });
    } catch (e) {
        return JSON.stringify({ error: String(e) });
    }
})()"#;

/// Attach static markup below the document so it can be snapshotted.
pub const INJECT_MARKUP: &str = r#"(function(){
    try {
        const args = {{ARGS}};
        const body = document.body;
        if (!body) return JSON.stringify({ error: 'document has no body' });
        const docHeight = Math.max(
            document.documentElement ? document.documentElement.scrollHeight : 0,
            body.scrollHeight
        );
        const host = document.createElement('div');
        host.id = args.containerId;
        host.style.position = 'absolute';
        host.style.left = '0px';
        host.style.top = (docHeight + 200) + 'px';
        host.style.width = args.width + 'px';
        if (args.height) host.style.height = args.height + 'px';
        host.innerHTML = args.html;
        body.appendChild(host);
        return JSON.stringify({ injected: true });
    } catch (e) {
        return JSON.stringify({ error: String(e) });
    }
})()"#;

/// Find the dashboard's sections and tag each with `args.attr`.
///
/// Replies `{status: "found", sections, cover}`, `{status: "no-root"}` or
/// `{status: "no-container"}`.
pub const DISCOVER_SECTIONS: &str = r#"(function(){
    try {
        const args = {{ARGS}};
        const root = document.querySelector(args.root);
        if (!root) return JSON.stringify({ status: 'no-root' });

        let container = null;
        if (args.container) {
            container = root.matches(args.container) ? root : root.querySelector(args.container);
            if (!container) return JSON.stringify({ status: 'no-container' });
        } else {
            container = root.querySelector(args.defaultContainer) || root;
        }

        const cover = args.cover ? root.querySelector(args.cover) : null;
        if (cover) cover.setAttribute(args.coverAttr, '1');

        const sections = [];
        Array.from(container.children).forEach(function(el){
            if (el.tagName === 'SCRIPT' || el.tagName === 'STYLE') return;
            if (el.classList.contains('hidden')) return;
            if (!(el.offsetHeight > 0)) return;
            if (el === cover) return;
            const index = sections.length;
            el.setAttribute(args.attr, String(index));
            sections.push({
                index: index,
                fullPage: el.getAttribute('data-report-full') === 'true' || el.classList.contains('report-full')
            });
        });
        return JSON.stringify({ status: 'found', sections: sections, cover: !!cover });
    } catch (e) {
        return JSON.stringify({ error: String(e) });
    }
})()"#;

/// Tag every child of a report preview container with `args.attr`.
pub const DISCOVER_PAGES: &str = r#"(function(){
    try {
        const args = {{ARGS}};
        const container = document.querySelector(args.container);
        if (!container) return JSON.stringify({ status: 'no-container' });
        const sections = [];
        Array.from(container.children).forEach(function(el, index){
            el.setAttribute(args.attr, String(index));
            sections.push({ index: index, fullPage: true });
        });
        return JSON.stringify({ status: 'found', sections: sections, cover: false });
    } catch (e) {
        return JSON.stringify({ error: String(e) });
    }
})()"#;

/// Strip discovery attributes from the document.
pub const CLEAR_MARKERS: &str = r#"(function(){
    try {
        const args = {{ARGS}};
        let cleared = 0;
        args.attrs.forEach(function(attr){
            document.querySelectorAll('[' + attr + ']').forEach(function(el){
                el.removeAttribute(attr);
                cleared++;
            });
        });
        return JSON.stringify({ cleared: cleared });
    } catch (e) {
        return JSON.stringify({ error: String(e) });
    }
})()"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_embeds_json_arguments() {
        let script = render(MEASURE, &json!({ "containerId": "snap-1" })).unwrap();
        assert!(script.contains(r#"const args = {"containerId":"snap-1"};"#));
        assert!(!script.contains(ARGS_TOKEN));
    }

    #[test]
    fn render_escapes_hostile_selectors() {
        let script = render(MOUNT, &json!({ "selector": "a'); alert(1); ('" })).unwrap();
        assert!(script.contains(r#""selector":"a'); alert(1); ('""#));
    }

    #[test]
    fn every_template_takes_arguments_or_none() {
        for tpl in [
            MOUNT,
            APPLY,
            SIZE_SVGS,
            COPY_CANVASES,
            MEASURE,
            REMOVE,
            INJECT_MARKUP,
            DISCOVER_SECTIONS,
            DISCOVER_PAGES,
            CLEAR_MARKERS,
        ] {
            assert!(tpl.contains(ARGS_TOKEN));
        }
        assert!(!FONTS_READY.contains(ARGS_TOKEN));
    }
}
