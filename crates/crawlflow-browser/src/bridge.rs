//! Line protocol between [`crate::PlaywrightDriver`] and its Node.js bridge.
//!
//! Requests are single-line JSON objects on the bridge's stdin. Replies are
//! stdout lines prefixed with [`BRIDGE_MARKER`]; any other stdout line is
//! ordinary script output and is only logged.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DriverError, Result};

pub(crate) const BRIDGE_MARKER: &str = "__CRAWLFLOW_BRIDGE__=";

#[derive(Debug, Serialize)]
pub(crate) struct BridgeRequest<'a> {
    pub id: u64,
    pub op: &'a str,
    pub args: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BridgeReply {
    pub id: u64,
    pub ok: bool,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub timeout: bool,
}

impl BridgeReply {
    pub fn into_result(self) -> Result<Value> {
        if self.ok {
            return Ok(self.value);
        }

        let message = self
            .error
            .unwrap_or_else(|| "bridge reported an unknown failure".to_string());
        if self.timeout {
            Err(DriverError::Timeout(message))
        } else {
            Err(DriverError::Bridge(message))
        }
    }
}

/// Parse a stdout line. Returns `None` for lines that are not bridge replies.
pub(crate) fn parse_reply_line(line: &str) -> Option<Result<BridgeReply>> {
    let rest = line.strip_prefix(BRIDGE_MARKER)?;
    Some(serde_json::from_str(rest.trim()).map_err(DriverError::from))
}

pub(crate) fn build_bridge_script() -> String {
    let mut script = String::new();
    script.push_str("import fs from 'node:fs';\n");
    script.push_str("import path from 'node:path';\n");
    script.push_str("import readline from 'node:readline';\n");
    script.push_str("import { createRequire } from 'node:module';\n\n");
    script.push_str(&format!("const MARKER = '{}';\n", BRIDGE_MARKER));
    script.push_str("const reply = (payload) => {\n");
    script.push_str("  process.stdout.write(`${MARKER}${JSON.stringify(payload)}\\n`);\n");
    script.push_str("};\n");
    script.push_str("const describe = (error) => (error && error.stack ? error.stack : String(error));\n\n");

    // Resolve playwright from the working directory (and NODE_PATH), not from
    // the temp directory the script lives in.
    script.push_str("let chromium;\n");
    script.push_str("try {\n");
    script.push_str("  const require = createRequire(path.join(process.cwd(), 'crawlflow-bridge.cjs'));\n");
    script.push_str("  ({ chromium } = require('playwright'));\n");
    script.push_str("} catch (error) {\n");
    script.push_str("  process.stderr.write(describe(error) + '\\n');\n");
    script.push_str("  reply({ id: 0, ok: false, error: describe(error) });\n");
    script.push_str("  process.exit(1);\n");
    script.push_str("}\n\n");

    script.push_str("const state = {\n");
    script.push_str("  context: null,\n");
    script.push_str("  pages: new Map(),\n");
    script.push_str("  elements: new Map(),\n");
    script.push_str("  elementKeys: new Map(),\n");
    script.push_str("  popupWaiters: new Map(),\n");
    script.push_str("  nextPage: 0,\n");
    script.push_str("  nextElement: 0,\n");
    script.push_str("};\n\n");

    script.push_str("const registerPage = (page) => {\n");
    script.push_str("  const id = `page-${++state.nextPage}`;\n");
    script.push_str("  state.pages.set(id, page);\n");
    script.push_str("  return id;\n");
    script.push_str("};\n");
    script.push_str("const pageOf = (id) => {\n");
    script.push_str("  const page = state.pages.get(id);\n");
    script.push_str("  if (!page) throw new Error(`unknown page handle: ${id}`);\n");
    script.push_str("  return page;\n");
    script.push_str("};\n");
    script.push_str("const elementOf = (id) => {\n");
    script.push_str("  const element = state.elements.get(id);\n");
    script.push_str("  if (!element) throw new Error(`unknown element handle: ${id}`);\n");
    script.push_str("  return element.locator;\n");
    script.push_str("};\n");
    script.push_str("const contextOf = () => {\n");
    script.push_str("  if (!state.context) throw new Error('browser is not launched');\n");
    script.push_str("  return state.context;\n");
    script.push_str("};\n");
    script.push_str("const hasKeys = (value) => value && Object.keys(value).length > 0;\n\n");

    script.push_str("const ops = {\n");
    script.push_str("  async launch(args) {\n");
    script.push_str("    await fs.promises.mkdir(args.userDataDir, { recursive: true });\n");
    script.push_str("    state.context = await chromium.launchPersistentContext(args.userDataDir, {\n");
    script.push_str("      headless: args.headless,\n");
    script.push_str("      userAgent: args.userAgent,\n");
    script.push_str("      args: args.chromiumArgs,\n");
    script.push_str("    });\n");
    script.push_str("    await state.context.clearCookies();\n");
    script.push_str("    await state.context.addInitScript(() => {\n");
    script.push_str("      Object.defineProperty(navigator, 'webdriver', { get: () => undefined });\n");
    script.push_str("    });\n");
    script.push_str("    const first = state.context.pages()[0] ?? (await state.context.newPage());\n");
    script.push_str("    return registerPage(first);\n");
    script.push_str("  },\n");
    script.push_str("  async goto(args) {\n");
    script.push_str("    const options = {};\n");
    script.push_str("    if (args.timeoutMs !== null && args.timeoutMs !== undefined) options.timeout = args.timeoutMs;\n");
    script.push_str("    await pageOf(args.page).goto(args.url, options);\n");
    script.push_str("    return null;\n");
    script.push_str("  },\n");
    script.push_str("  async reload(args) {\n");
    script.push_str("    await pageOf(args.page).reload();\n");
    script.push_str("    return null;\n");
    script.push_str("  },\n");
    script.push_str("  async waitForLoad(args) {\n");
    script.push_str("    await pageOf(args.page).waitForLoadState('load');\n");
    script.push_str("    return null;\n");
    script.push_str("  },\n");
    script.push_str("  async url(args) {\n");
    script.push_str("    return pageOf(args.page).url();\n");
    script.push_str("  },\n");
    script.push_str("  async content(args) {\n");
    script.push_str("    return await pageOf(args.page).content();\n");
    script.push_str("  },\n");
    script.push_str("  async screenshot(args) {\n");
    script.push_str("    await fs.promises.mkdir(path.dirname(args.path), { recursive: true });\n");
    script.push_str("    await pageOf(args.page).screenshot({ path: args.path, fullPage: true });\n");
    script.push_str("    return null;\n");
    script.push_str("  },\n");
    script.push_str("  async closePage(args) {\n");
    script.push_str("    await pageOf(args.page).close();\n");
    script.push_str("    state.pages.delete(args.page);\n");
    script.push_str("    for (const [id, element] of state.elements) {\n");
    script.push_str("      if (element.page !== args.page) continue;\n");
    script.push_str("      state.elements.delete(id);\n");
    script.push_str("      state.elementKeys.delete(element.key);\n");
    script.push_str("    }\n");
    script.push_str("    return null;\n");
    script.push_str("  },\n");
    script.push_str("  async resolve(args) {\n");
    script.push_str("    const page = pageOf(args.page);\n");
    // Locators are lazy, so one handle per (page, locator) is enough.
    script.push_str("    const key = JSON.stringify([args.page, args.method, args.value, args.extras ?? {}]);\n");
    script.push_str("    const known = state.elementKeys.get(key);\n");
    script.push_str("    if (known) return known;\n");
    script.push_str("    const locator = hasKeys(args.extras)\n");
    script.push_str("      ? page[args.method](args.value, args.extras)\n");
    script.push_str("      : page[args.method](args.value);\n");
    script.push_str("    const id = `element-${++state.nextElement}`;\n");
    script.push_str("    state.elements.set(id, { page: args.page, key, locator });\n");
    script.push_str("    state.elementKeys.set(key, id);\n");
    script.push_str("    return id;\n");
    script.push_str("  },\n");
    script.push_str("  async isVisible(args) {\n");
    script.push_str("    return await elementOf(args.element).isVisible();\n");
    script.push_str("  },\n");
    script.push_str("  async waitFor(args) {\n");
    script.push_str("    await elementOf(args.element).waitFor();\n");
    script.push_str("    return null;\n");
    script.push_str("  },\n");
    script.push_str("  async invoke(args) {\n");
    script.push_str("    const locator = elementOf(args.element);\n");
    script.push_str("    const call = [];\n");
    script.push_str("    if (args.value !== null && args.value !== undefined) call.push(args.value);\n");
    script.push_str("    if (hasKeys(args.extras)) call.push(args.extras);\n");
    script.push_str("    const value = await locator[args.method](...call);\n");
    script.push_str("    return value === undefined ? null : value;\n");
    script.push_str("  },\n");
    script.push_str("  async setInputFiles(args) {\n");
    script.push_str("    const files = args.files.map((file) => ({\n");
    script.push_str("      name: file.name,\n");
    script.push_str("      mimeType: file.mimeType,\n");
    script.push_str("      buffer: Buffer.from(file.buffer, 'base64'),\n");
    script.push_str("    }));\n");
    script.push_str("    await elementOf(args.element).setInputFiles(files);\n");
    script.push_str("    return null;\n");
    script.push_str("  },\n");
    script.push_str("  async selectorExists(args) {\n");
    script.push_str("    return (await pageOf(args.page).$(args.selector)) !== null;\n");
    script.push_str("  },\n");
    script.push_str("  async evaluate(args) {\n");
    script.push_str("    const fn = new Function(`return (${args.expression});`)();\n");
    script.push_str("    const value = await pageOf(args.page).evaluate(fn, args.arg);\n");
    script.push_str("    return value === undefined ? null : value;\n");
    script.push_str("  },\n");
    script.push_str("  async cookies() {\n");
    script.push_str("    return await contextOf().cookies();\n");
    script.push_str("  },\n");
    script.push_str("  async clearCookies() {\n");
    script.push_str("    await contextOf().clearCookies();\n");
    script.push_str("    return null;\n");
    script.push_str("  },\n");
    script.push_str("  async beginPopup(args) {\n");
    script.push_str("    const waiter = pageOf(args.page).waitForEvent('popup');\n");
    script.push_str("    waiter.catch(() => {});\n");
    script.push_str("    state.popupWaiters.set(args.page, waiter);\n");
    script.push_str("    return null;\n");
    script.push_str("  },\n");
    script.push_str("  async takePopup(args) {\n");
    script.push_str("    const waiter = state.popupWaiters.get(args.page);\n");
    script.push_str("    if (!waiter) throw new Error(`no popup capture in progress for ${args.page}`);\n");
    script.push_str("    state.popupWaiters.delete(args.page);\n");
    script.push_str("    const popup = await waiter;\n");
    script.push_str("    await popup.waitForLoadState('load');\n");
    script.push_str("    return registerPage(popup);\n");
    script.push_str("  },\n");
    script.push_str("  async blockResourceTypes(args) {\n");
    script.push_str("    await pageOf(args.page).route('**/*', (route) =>\n");
    script.push_str("      args.types.includes(route.request().resourceType()) ? route.abort() : route.continue(),\n");
    script.push_str("    );\n");
    script.push_str("    return null;\n");
    script.push_str("  },\n");
    script.push_str("  async shutdown() {\n");
    script.push_str("    if (state.context) await state.context.close().catch(() => {});\n");
    script.push_str("    state.context = null;\n");
    script.push_str("    return null;\n");
    script.push_str("  },\n");
    script.push_str("};\n\n");

    script.push_str("const input = readline.createInterface({ input: process.stdin });\n");
    script.push_str("for await (const line of input) {\n");
    script.push_str("  if (!line.trim()) continue;\n");
    script.push_str("  let request;\n");
    script.push_str("  try {\n");
    script.push_str("    request = JSON.parse(line);\n");
    script.push_str("  } catch (error) {\n");
    script.push_str("    reply({ id: 0, ok: false, error: `invalid request: ${describe(error)}` });\n");
    script.push_str("    continue;\n");
    script.push_str("  }\n");
    script.push_str("  const handler = ops[request.op];\n");
    script.push_str("  if (!handler) {\n");
    script.push_str("    reply({ id: request.id, ok: false, error: `unsupported op: ${request.op}` });\n");
    script.push_str("    continue;\n");
    script.push_str("  }\n");
    script.push_str("  try {\n");
    script.push_str("    const value = await handler(request.args ?? {});\n");
    script.push_str("    reply({ id: request.id, ok: true, value: value ?? null });\n");
    script.push_str("  } catch (error) {\n");
    script.push_str("    const timeout = Boolean(error && error.name === 'TimeoutError');\n");
    script.push_str("    reply({ id: request.id, ok: false, timeout, error: describe(error) });\n");
    script.push_str("  }\n");
    script.push_str("  if (request.op === 'shutdown') break;\n");
    script.push_str("}\n");
    script.push_str("if (state.context) await state.context.close().catch(() => {});\n");
    script.push_str("process.exit(0);\n");

    script
}
