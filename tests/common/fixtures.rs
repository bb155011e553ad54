//! Bundle fixtures for rule-set and CLI tests.
//!
//! Shaped like webpack 5 development output: one bundle where modules stay
//! separate factories behind the module cache, and one where module
//! concatenation left only the runtime helpers. The `*_HARDENED` constants are
//! the exact output of the main rule set for each.

#![allow(dead_code)]

/// Multi-module build: `__webpack_module_cache__` plus a modules table.
pub const MODULAR_BUNDLE: &str = r#"(() => { // webpackBootstrap
	"use strict";
	var __webpack_modules__ = ({

"./src/greet.js":
((__unused_webpack_module, __webpack_exports__, __webpack_require__) => {

__webpack_require__.r(__webpack_exports__);
__webpack_require__.d(__webpack_exports__, {
  "greet": () => (greet)
});
function greet(name) {
  return { message: "hello " + name };
}

})

	});
	// The module cache
	var __webpack_module_cache__ = {};
	
	// The require function
	function __webpack_require__(moduleId) {
		// Check if module is in cache
		var cachedModule = __webpack_module_cache__[moduleId];
		if (cachedModule !== undefined) {
			return cachedModule.exports;
		}
		// Create a new module (and put it into the cache)
		var module = __webpack_module_cache__[moduleId] = {
			exports: {}
		};
	
		// Execute the module function
		__webpack_modules__[moduleId].call(module.exports, module, module.exports, __webpack_require__);
	
		// Return the exports of the module
		return module.exports;
	}
	
	// expose the modules object (__webpack_modules__)
	__webpack_require__.m = __webpack_modules__;
	
	/* webpack/runtime/define property getters */
	(() => {
		// define getter functions for harmony exports
		__webpack_require__.d = (exports, definition) => {
			for(var key in definition) {
				if(__webpack_require__.o(definition, key) && !__webpack_require__.o(exports, key)) {
					Object.defineProperty(exports, key, { enumerable: true, get: definition[key] });
				}
			}
		};
	})();
	
	/* webpack/runtime/hasOwnProperty shorthand */
	(() => {
		__webpack_require__.o = (obj, prop) => (Object.prototype.hasOwnProperty.call(obj, prop))
	})();
	
	/* webpack/runtime/make namespace object */
	(() => {
		// define __esModule on exports
		__webpack_require__.r = (exports) => {
			if(typeof Symbol !== 'undefined' && Symbol.toStringTag) {
				Object.defineProperty(exports, Symbol.toStringTag, { value: 'Module' });
			}
			Object.defineProperty(exports, '__esModule', { value: true });
		};
	})();
	
var __webpack_exports__ = {};
(() => {
__webpack_require__.r(__webpack_exports__);
var _greet_js__WEBPACK_IMPORTED_MODULE_0__ = __webpack_require__("./src/greet.js");
console.log((0,_greet_js__WEBPACK_IMPORTED_MODULE_0__.greet)("world"));
})();

})()
;
"#;

/// [`MODULAR_BUNDLE`] after the main rule set.
pub const MODULAR_HARDENED: &str = r#"(() => { // webpackBootstrap
	"use strict";
	var __webpack_modules__ = ({__proto__: null,"./src/greet.js":
((__unused_webpack_module, __webpack_exports__, __webpack_require__) => {

__webpack_require__.r(__webpack_exports__);
__webpack_require__.d(__webpack_exports__, {__proto__: null,"greet": () => (greet)
});
function greet(name) {
  return { message: "hello " + name };
}

})

	});
	// The module cache
	for (let i = 0, props=["m","d","o","r"]; i < props.length; i++)
  defineProperty(__webpack_require__, props[i], {__proto__: null, value: 0, writable: 1});
var __webpack_module_cache__ = {__proto__: null};
	
	// The require function
	function __webpack_require__(moduleId) {
		// Check if module is in cache
		var cachedModule = __webpack_module_cache__[moduleId];
		if (cachedModule !== undefined) {
			return cachedModule.exports;
		}
		// Create a new module (and put it into the cache)
		var module = __webpack_module_cache__[moduleId] = {__proto__: null,exports: {__proto__: null}
		};
	
		// Execute the module function
		safeCall(__webpack_modules__[moduleId], module.exports, module, module.exports, __webpack_require__);
	
		// Return the exports of the module
		return module.exports;
	}
	
	// expose the modules object (__webpack_modules__)
	__webpack_require__.m = __webpack_modules__;
	
	/* webpack/runtime/define property getters */
	(() => {
		// define getter functions for harmony exports
		__webpack_require__.d = (exports, definition) => {
			for(var key in definition) {
				if(!(key in exports)) {
					defineProperty(exports, key, {__proto__: null,enumerable: true, get: definition[key] });
				}
			}
		};
	})();
	
	/* webpack/runtime/hasOwnProperty shorthand */
	(() => {
		__webpack_require__.o = (obj, prop) => (safeCall(hasOwnProperty, obj, prop))
	})();
	
	/* webpack/runtime/make namespace object */
	(() => {
		// define __esModule on exports
		__webpack_require__.r = (exports) => {
			if(true) {
				defineProperty(exports, toStringTagSym, {__proto__: null,value: 'Module' });
			}
			defineProperty(exports, '__esModule', {__proto__: null,value: true });
		};
	})();
	
var __webpack_exports__ = {__proto__: null};
(() => {
__webpack_require__.r(__webpack_exports__);
var _greet_js__WEBPACK_IMPORTED_MODULE_0__ = __webpack_require__("./src/greet.js");
console.log((0,_greet_js__WEBPACK_IMPORTED_MODULE_0__.greet)("world"));
})();

})()
;
"#;

/// Fully concatenated build: the registry variable is the require function's
/// own property bag and there is no modules table.
pub const CONCATENATED_BUNDLE: &str = r#"(() => {
"use strict";
var __webpack_require__ = {};
(() => {
__webpack_require__.d = (exports, definition) => {
	for(var key in definition) {
		if(__webpack_require__.o(definition, key) && !__webpack_require__.o(exports, key)) {
			Object.defineProperty(exports, key, { enumerable: true, get: definition[key] });
		}
	}
};
})();
(() => {
__webpack_require__.o = (obj, prop) => (Object.prototype.hasOwnProperty.call(obj, prop))
})();
var __webpack_exports__ = {};
__webpack_require__.d(__webpack_exports__, {
  greet: () => (greet)
});
function greet(name) {
  return { message: "hello " + name };
}
})();
"#;

/// [`CONCATENATED_BUNDLE`] after the main rule set.
pub const CONCATENATED_HARDENED: &str = r#"(() => {
"use strict";
var __webpack_require__ = {__proto__: null};
(() => {
__webpack_require__.d = (exports, definition) => {
	for(var key in definition) {
		if(__webpack_require__.o(definition, key) && !__webpack_require__.o(exports, key)) {
			Object.defineProperty(exports, key, {__proto__: null,enumerable: true, get: definition[key] });
		}
	}
};
})();
(() => {
__webpack_require__.o = (obj, prop) => (Object.prototype.hasOwnProperty.call(obj, prop))
})();
var __webpack_exports__ = {__proto__: null};
__webpack_require__.d(__webpack_exports__, {__proto__: null,greet: () => (greet)
});
function greet(name) {
  return { message: "hello " + name };
}
})();
"#;

/// A chunk with no webpack runtime at all.
pub const PLAIN_SCRIPT: &str = "document.title = 'static page';\n";

/// Hook-protocol request for `source`.
#[must_use]
pub fn hook_request(source: &str, chunk_name: Option<&str>) -> String {
    let mut request = serde_json::json!({ "source": source });
    if let Some(name) = chunk_name {
        request["chunk"] = serde_json::json!({ "name": name });
    }
    request.to_string()
}

/// [`MODULAR_BUNDLE`] with `modules` extra factories ahead of the real one in
/// its modules table. Each adds about 215 bytes.
#[must_use]
pub fn modular_bundle_with(modules: usize) -> String {
    use std::fmt::Write as _;

    let mut factories = String::new();
    for i in 0..modules {
        let _ = write!(
            factories,
            "\"./src/generated/m{i}.js\":\n\
             ((__unused_webpack_module, __webpack_exports__, __webpack_require__) => {{\n\
             __webpack_require__.r(__webpack_exports__);\n\
             __webpack_require__.d(__webpack_exports__, {{\n  \"value{i}\": () => (value{i})\n}});\n\
             const value{i} = {{ id: {i}, tags: [\"a\", \"b\"], nested: {{ depth: 1 }} }};\n\
             }}),\n\n"
        );
    }
    MODULAR_BUNDLE.replacen("\"./src/greet.js\":", &format!("{factories}\"./src/greet.js\":"), 1)
}
