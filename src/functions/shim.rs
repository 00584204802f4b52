// src/functions/shim.rs

//! Node.js shim that runs one serverless handler invocation.
//!
//! The Rust side never executes JavaScript itself. For every request it
//! spawns Node with this shim, the staged handler file and a context file.
//!
//! Responsibilities of the shim:
//! - Load the handler exactly as written
//! - Collect `console.*` output for this invocation only
//! - Call `main(context, sendResponse)` and honour the first response
//! - Report one result line to STDOUT, prefixed with `RESULT_MARKER`
//!
//! Each invocation gets its own process, so log capture can never bleed
//! between concurrent requests.

/// Prefix of the single result line written by the shim.
pub const RESULT_MARKER: &str = "__HS_RESULT__";

/// File name the shim is written under.
pub const SHIM_FILE_NAME: &str = "hs_function_runner.mjs";

/// Usage (internal):
/// node hs_function_runner.mjs <handlerFile> <context.json>
///
/// Expected handler shape:
/// exports.main = (context, sendResponse) => { ... }
pub fn node_shim() -> &'static str {
    r#"
import fs from "node:fs";
import path from "node:path";
import { pathToFileURL } from "node:url";
import { format } from "node:util";

const MARKER = "__HS_RESULT__";
const [, , handlerFile, contextPath] = process.argv;

const writeOut = process.stdout.write.bind(process.stdout);
const logs = [];

function record(level, args) {
  logs.push({ level, message: format(...args), timestamp: Date.now() });
}

for (const level of ["log", "info", "warn", "error", "debug", "trace"]) {
  console[level] = (...args) => record(level, args);
}

function serializeError(type, e) {
  return {
    type,
    message: e?.message || String(e),
    stack: e?.stack || null,
  };
}

let finished = false;
function finish(result) {
  if (finished) return;
  finished = true;
  writeOut(MARKER + JSON.stringify({ logs, ...result }) + "\n", () => process.exit(0));
}

let responded = false;

function fail(type, e) {
  if (responded) {
    record("error", [e]);
    return;
  }
  finish({ ok: false, responded: false, response: null, error: serializeError(type, e) });
}

async function run() {
  let context;
  try {
    context = JSON.parse(fs.readFileSync(contextPath, "utf8"));
  } catch (e) {
    return fail("runtime", e);
  }

  let mod;
  try {
    mod = await import(pathToFileURL(path.resolve(handlerFile)).href);
  } catch (e) {
    return fail("load", e);
  }

  const main = mod?.main || mod?.default?.main;
  if (typeof main !== "function") {
    return fail("load", new Error("Handler file must export main(context, sendResponse)"));
  }

  const sendResponse = (payload) => {
    if (responded) {
      record("warn", ["sendResponse was called more than once; ignoring the extra call"]);
      return;
    }
    responded = true;
    const response = payload ?? null;
    // let the current tick finish so trailing logs are captured
    setImmediate(() => finish({ ok: true, responded: true, response, error: null }));
  };

  process.on("uncaughtException", (e) => fail("unhandled", e));
  process.on("unhandledRejection", (e) => fail("unhandled", e));
  process.on("beforeExit", () => {
    finish({
      ok: false,
      responded: false,
      response: null,
      error: { type: "no_response", message: "Function completed without calling sendResponse", stack: null },
    });
  });

  let returned;
  try {
    returned = main(context, sendResponse);
  } catch (e) {
    return fail("unhandled", e);
  }

  if (returned && typeof returned.then === "function") {
    try {
      const value = await returned;
      if (!responded && value !== undefined) {
        sendResponse(value);
      }
    } catch (e) {
      if (!responded) fail("unhandled", e);
    }
  }
}

run().catch((e) => fail("runtime", e));
"#
}
