use crate::host::{Host, Message, Severity};
use crate::input::expression::Expression;

pub fn report(host: &mut dyn Host, severity: Severity, expr: &Expression, text: String) {
    let message = Message {
        severity: severity,
        text: text,
        file: expr.file.as_ref().clone(),
        line: expr.line,
        column: expr.column,
    };
    match severity {
        Severity::Information => debug!("{}", message),
        Severity::Warning | Severity::Error => info!("{}", message),
    }
    host.add_message(message);
}

pub fn error(host: &mut dyn Host, expr: &Expression, text: String) {
    report(host, Severity::Error, expr, text);
}

pub fn warning(host: &mut dyn Host, expr: &Expression, text: String) {
    report(host, Severity::Warning, expr, text);
}

pub fn information(host: &mut dyn Host, expr: &Expression, text: String) {
    report(host, Severity::Information, expr, text);
}
