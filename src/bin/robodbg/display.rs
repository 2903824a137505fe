use robobrain::vm::{ErrorState, RegisterSnapshot};

pub fn format_registers(regs: &RegisterSnapshot) -> String {
    format!(
        "{} {} {} {} {} {} {}",
        format!(colorify!(yellow: "R1={}"), regs.r1),
        format!(colorify!(yellow: "R2={}"), regs.r2),
        format!(colorify!(yellow: "R3={}"), regs.r3),
        format!(colorify!(yellow: "R4={}"), regs.r4),
        format!(colorify!(blue: "PC={:#06x}"), regs.pc),
        format!(colorify!(blue: "SP={:#06x}"), regs.sp),
        format!(colorify!(blue: "IX={:#06x}"), regs.ix),
    )
}

pub fn format_errors(errors: &ErrorState) -> String {
    if errors.illegal_instruction || errors.on_fire {
        format!(
            colorify!(red: "illegal_instruction={} on_fire={}"),
            errors.illegal_instruction, errors.on_fire
        )
    } else {
        format!(colorify!(green: "no errors"))
    }
}
