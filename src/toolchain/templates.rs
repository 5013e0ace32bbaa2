//! Embedded templates staged next to external tool invocations.

/// Driver script loading the expression graph and emitting derivative code.
pub const CODEGEN_DRIVER_TEMPLATE: &str = r#"# Generated by ad-forge for function '{{ job }}'. Safe to delete.
import casadi as ca

F = ca.Function.load("{{ graph_file }}")
if F.nnz_in(0) != {{ n_inputs }}:
    raise SystemExit("expected {{ n_inputs }} inputs, graph has %d" % F.nnz_in(0))

x = ca.MX.sym("x", {{ n_inputs }})
f = ca.Function("{{ job }}", [x], [F(x)])

cg = ca.CodeGenerator("{{ generated_code }}", {"with_header": False})
cg.add(f)
cg.add(f.jacobian())
{%- if second_order %}
cg.add(f.jacobian().jacobian())
{%- endif %}
cg.generate()
"#;

/// Build configuration for the compiled function.
///
/// `TARGET_NAME` and `CMAKE_INSTALL_PREFIX` are supplied at configure time.
pub const NATIVE_CMAKELISTS: &str = r#"cmake_minimum_required(VERSION 3.15)
project(ad_forge_function C)

if(NOT TARGET_NAME)
    message(FATAL_ERROR "TARGET_NAME must be set")
endif()

add_library(${TARGET_NAME} SHARED ${TARGET_NAME}.c)
set_target_properties(${TARGET_NAME} PROPERTIES WINDOWS_EXPORT_ALL_SYMBOLS ON)
install(TARGETS ${TARGET_NAME}
    RUNTIME DESTINATION bin
    LIBRARY DESTINATION bin
    ARCHIVE DESTINATION lib)

if(NOT WIN32)
    add_library(${TARGET_NAME}_static STATIC ${TARGET_NAME}.c)
    set_target_properties(${TARGET_NAME}_static PROPERTIES OUTPUT_NAME ${TARGET_NAME})
    install(TARGETS ${TARGET_NAME}_static ARCHIVE DESTINATION lib)
endif()
"#;
